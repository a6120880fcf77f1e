use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Entry point into the catalog for paths that appeared or disappeared.
///
/// Implemented by the ingestion pipeline; the scheduler hands finished
/// transcode outputs back through it and the library router forwards watcher
/// events to it.
#[async_trait]
pub trait MediaIngest: Send + Sync {
    async fn ingest_created(&self, path: &Path) -> Result<()>;

    /// Returns whether a catalogued entity was removed.
    async fn ingest_deleted(&self, path: &Path) -> Result<bool>;
}
