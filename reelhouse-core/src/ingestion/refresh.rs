//! Periodic metadata refresh for entries that have not been touched in a
//! while.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reelhouse_model::MediaEntity;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{IngestionPipeline, resolve_metadata};
use crate::classifier::MediaPath;
use crate::error::{MediaError, Result};
use crate::periodic::spawn_periodic;

/// Background housekeeping: metadata refresh and event retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub refresh_interval_secs: u64,
    /// Entities not updated for this long are refreshed.
    pub update_frequency_secs: u64,
    /// Upper bound on entities refreshed per pass.
    pub update_limit: u32,
    pub retention_interval_secs: u64,
    /// Change-log entries older than this are pruned.
    pub event_max_age_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 60 * 60,
            update_frequency_secs: 3 * 24 * 60 * 60,
            update_limit: 200,
            retention_interval_secs: 24 * 60 * 60,
            event_max_age_secs: 30 * 24 * 60 * 60,
        }
    }
}

impl MaintenanceConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn update_frequency(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs)
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }

    pub fn event_max_age(&self) -> Duration {
        Duration::from_secs(self.event_max_age_secs)
    }
}

#[derive(Debug, Clone)]
pub struct MetadataRefresher {
    pipeline: IngestionPipeline,
    config: MaintenanceConfig,
}

impl MetadataRefresher {
    pub fn new(pipeline: IngestionPipeline, config: MaintenanceConfig) -> Self {
        Self { pipeline, config }
    }

    /// Refreshes up to `update_limit` stale entities, oldest first. Each one
    /// is saved even when the provider has nothing new, so it is not picked
    /// again next pass. Returns how many were saved.
    pub async fn refresh_stale(&self) -> Result<usize> {
        let age = chrono::Duration::from_std(self.config.update_frequency())
            .map_err(|e| MediaError::Internal(format!("update frequency out of range: {e}")))?;
        let cutoff = Utc::now() - age;

        let ports = self.pipeline.ports();
        let stale = ports.media.find_stale(cutoff, self.config.update_limit).await?;
        if stale.is_empty() {
            debug!("no stale media to refresh");
            return Ok(0);
        }

        let mut refreshed = 0;
        for entity in stale {
            match self.refresh_one(entity).await {
                Ok(()) => refreshed += 1,
                Err(err) => warn!("metadata refresh failed: {}", err),
            }
        }

        info!(refreshed, "metadata refresh pass complete");
        Ok(refreshed)
    }

    async fn refresh_one(&self, mut entity: MediaEntity) -> Result<()> {
        let ports = self.pipeline.ports();
        let media_path = MediaPath::parse(&entity.relative_path)?;

        let series_metadata = match media_path.series_path() {
            Some(series) if series.relative_path() != entity.relative_path => ports
                .media
                .get_by_path(series.relative_path())
                .await?
                .and_then(|series| series.metadata),
            _ => None,
        };

        let resolved =
            resolve_metadata(ports.provider.as_ref(), &media_path, series_metadata.as_ref()).await;
        entity.metadata = Some(resolved.apply_to(entity.metadata.take()));
        entity.touch();

        ports.media.save(&entity).await?;
        if let Err(err) = ports.cache.invalidate(&entity.relative_path).await {
            warn!(path = %entity.relative_path, "failed to invalidate cache: {}", err);
        }

        debug!(path = %entity.relative_path, "metadata refreshed");
        Ok(())
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let period = self.config.refresh_interval();
        spawn_periodic("metadata-refresh", period, shutdown, move || {
            let refresher = Arc::clone(&self);
            async move {
                if let Err(err) = refresher.refresh_stale().await {
                    error!("metadata refresh failed: {}", err);
                }
            }
        })
    }
}
