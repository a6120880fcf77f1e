use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelhouse_model::MediaEvent;

use super::Page;
use crate::error::Result;

/// Append-only change log.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &MediaEvent) -> Result<()>;

    /// Events strictly after `since`, ordered by time then id.
    async fn events_since(&self, since: DateTime<Utc>, page: Page) -> Result<Vec<MediaEvent>>;

    /// Drops events older than the cutoff. Returns how many were removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
