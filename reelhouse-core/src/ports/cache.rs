use async_trait::async_trait;
use reelhouse_model::MediaEntity;

use crate::error::Result;

/// Write-through lookup cache in front of the media store.
#[async_trait]
pub trait MediaCache: Send + Sync {
    async fn get(&self, relative_path: &str) -> Result<Option<MediaEntity>>;

    async fn put(&self, entity: &MediaEntity) -> Result<()>;

    async fn invalidate(&self, relative_path: &str) -> Result<()>;
}
