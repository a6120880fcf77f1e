use async_trait::async_trait;

use crate::error::Result;

/// Fire-and-forget announcement of newly catalogued media. Callers log and
/// swallow failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, path: &str) -> Result<()>;
}
