use async_trait::async_trait;
use reelhouse_model::MediaMetadata;

use crate::error::ProviderError;
use crate::ports::MetadataProvider;

/// Stand-in when no metadata provider is wired up. Every lookup fails, so the
/// pipeline falls back to path-derived metadata.
#[derive(Debug, Clone, Default)]
pub struct UnavailableProvider;

impl UnavailableProvider {
    fn unavailable(what: String) -> ProviderError {
        ProviderError::Unavailable(format!("no metadata provider configured ({what})"))
    }
}

#[async_trait]
impl MetadataProvider for UnavailableProvider {
    async fn fetch_movie(&self, title: &str, _year: Option<i32>) -> Result<MediaMetadata, ProviderError> {
        Err(Self::unavailable(format!("movie {title}")))
    }

    async fn fetch_series(&self, title: &str) -> Result<MediaMetadata, ProviderError> {
        Err(Self::unavailable(format!("series {title}")))
    }

    async fn fetch_season(&self, series: &str, season: u32) -> Result<MediaMetadata, ProviderError> {
        Err(Self::unavailable(format!("{series} season {season}")))
    }

    async fn fetch_episode(
        &self,
        series: &str,
        season: u32,
        episode: u32,
    ) -> Result<MediaMetadata, ProviderError> {
        Err(Self::unavailable(format!("{series} S{season:02}E{episode:02}")))
    }
}
