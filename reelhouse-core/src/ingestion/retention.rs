use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::MaintenanceConfig;
use crate::error::{MediaError, Result};
use crate::periodic::spawn_periodic;
use crate::ports::EventStore;

/// Prunes change-log entries older than `event_max_age`.
#[derive(Clone)]
pub struct EventRetention {
    events: Arc<dyn EventStore>,
    config: MaintenanceConfig,
}

impl std::fmt::Debug for EventRetention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRetention")
            .field("event_max_age_secs", &self.config.event_max_age_secs)
            .finish()
    }
}

impl EventRetention {
    pub fn new(events: Arc<dyn EventStore>, config: MaintenanceConfig) -> Self {
        Self { events, config }
    }

    pub async fn prune(&self) -> Result<u64> {
        let age = chrono::Duration::from_std(self.config.event_max_age())
            .map_err(|e| MediaError::Internal(format!("event max age out of range: {e}")))?;
        let removed = self.events.prune_before(Utc::now() - age).await?;
        if removed > 0 {
            info!(removed, "pruned old media events");
        } else {
            debug!("no media events to prune");
        }
        Ok(removed)
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.config.retention_interval();
        spawn_periodic("event-retention", period, shutdown, move || {
            let retention = Arc::clone(&self);
            async move {
                if let Err(err) = retention.prune().await {
                    error!("event retention failed: {}", err);
                }
            }
        })
    }
}
