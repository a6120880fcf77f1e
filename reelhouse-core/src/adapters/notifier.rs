use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::ports::Notifier;

/// Announces new media through the tracing pipeline.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, path: &str) -> Result<()> {
        info!(target: "reelhouse::notify", title, path, "new media available");
        Ok(())
    }
}

/// Used when notifications are disabled.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _title: &str, _path: &str) -> Result<()> {
        Ok(())
    }
}
