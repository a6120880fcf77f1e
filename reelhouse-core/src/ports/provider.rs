use async_trait::async_trait;
use reelhouse_model::MediaMetadata;

use crate::error::ProviderError;

/// External metadata lookup.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_movie(&self, title: &str, year: Option<i32>) -> Result<MediaMetadata, ProviderError>;

    async fn fetch_series(&self, title: &str) -> Result<MediaMetadata, ProviderError>;

    async fn fetch_season(&self, series: &str, season: u32) -> Result<MediaMetadata, ProviderError>;

    async fn fetch_episode(
        &self,
        series: &str,
        season: u32,
        episode: u32,
    ) -> Result<MediaMetadata, ProviderError>;
}
