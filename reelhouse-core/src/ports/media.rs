use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelhouse_model::{MediaEntity, MediaEntityId};

use super::Page;
use crate::error::Result;

/// Catalogued entities keyed by library-relative path.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn get_by_path(&self, relative_path: &str) -> Result<Option<MediaEntity>>;

    async fn get(&self, id: MediaEntityId) -> Result<Option<MediaEntity>>;

    /// Insert or replace by `relative_path`.
    async fn save(&self, entity: &MediaEntity) -> Result<()>;

    /// Removes the entity at exactly this path. Returns whether one existed.
    async fn delete_by_path(&self, relative_path: &str) -> Result<bool>;

    /// Entities whose `updated_at` is older than the cutoff, oldest first.
    async fn find_stale(&self, older_than: DateTime<Utc>, limit: u32) -> Result<Vec<MediaEntity>>;

    async fn list(&self, page: Page) -> Result<Vec<MediaEntity>>;
}
