//! Process-local adapters. Used when no database is configured and as the
//! default test doubles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reelhouse_model::{
    JobId, JobStatus, MediaEntity, MediaEntityId, MediaEvent, TranscodeJob,
};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::ports::{EventStore, JobStore, MediaCache, MediaStore, Page};

/// Entities keyed by relative path.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaStore {
    entities: Arc<RwLock<HashMap<String, MediaEntity>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn get_by_path(&self, relative_path: &str) -> Result<Option<MediaEntity>> {
        Ok(self.entities.read().await.get(relative_path).cloned())
    }

    async fn get(&self, id: MediaEntityId) -> Result<Option<MediaEntity>> {
        Ok(self
            .entities
            .read()
            .await
            .values()
            .find(|entity| entity.id == id)
            .cloned())
    }

    async fn save(&self, entity: &MediaEntity) -> Result<()> {
        self.entities
            .write()
            .await
            .insert(entity.relative_path.clone(), entity.clone());
        Ok(())
    }

    async fn delete_by_path(&self, relative_path: &str) -> Result<bool> {
        Ok(self.entities.write().await.remove(relative_path).is_some())
    }

    async fn find_stale(&self, older_than: DateTime<Utc>, limit: u32) -> Result<Vec<MediaEntity>> {
        let guard = self.entities.read().await;
        let mut stale: Vec<MediaEntity> = guard
            .values()
            .filter(|entity| entity.updated_at < older_than)
            .cloned()
            .collect();
        stale.sort_by_key(|entity| entity.updated_at);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn list(&self, page: Page) -> Result<Vec<MediaEntity>> {
        let guard = self.entities.read().await;
        let mut all: Vec<MediaEntity> = guard.values().cloned().collect();
        all.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(all
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

/// Append-only event log held in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<MediaEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full log snapshot.
    pub async fn snapshot(&self) -> Vec<MediaEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &MediaEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn events_since(&self, since: DateTime<Utc>, page: Page) -> Result<Vec<MediaEvent>> {
        let guard = self.events.read().await;
        let mut matching: Vec<MediaEvent> = guard
            .iter()
            .filter(|event| event.occurred_at > since)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
        Ok(matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut guard = self.events.write().await;
        let before = guard.len();
        guard.retain(|event| event.occurred_at >= cutoff);
        Ok((before - guard.len()) as u64)
    }
}

/// Job records guarded by a single lock so `transition` is atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<JobId, TranscodeJob>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn upsert(&self, job: &TranscodeJob) -> Result<()> {
        self.jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<TranscodeJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn list_by_status(&self, status: JobStatus, limit: Option<u32>) -> Result<Vec<TranscodeJob>> {
        let guard = self.jobs.read().await;
        let mut jobs: Vec<TranscodeJob> = guard
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        if let Some(limit) = limit {
            jobs.truncate(limit as usize);
        }
        Ok(jobs)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .count() as u64)
    }

    async fn transition(&self, job_id: &JobId, expected: JobStatus, next: JobStatus) -> Result<bool> {
        let mut guard = self.jobs.write().await;
        match guard.get_mut(job_id) {
            Some(job) if job.status == expected => {
                job.status = next;
                job.updated_at = Utc::now();
                if next.is_terminal() {
                    job.eta = None;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_eta(&self, job_id: &JobId, eta: Option<Duration>) -> Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(job_id)
            && job.status == JobStatus::Running
        {
            job.eta = eta;
        }
        Ok(())
    }

    async fn remove(&self, job_id: &JobId) -> Result<bool> {
        Ok(self.jobs.write().await.remove(job_id).is_some())
    }

    async fn list_active(&self) -> Result<Vec<TranscodeJob>> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status.is_active())
            .cloned()
            .collect())
    }
}

/// Lookup cache backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, MediaEntity>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.entries.contains_key(relative_path)
    }
}

#[async_trait]
impl MediaCache for InMemoryCache {
    async fn get(&self, relative_path: &str) -> Result<Option<MediaEntity>> {
        Ok(self
            .entries
            .get(relative_path)
            .map(|entry| entry.value().clone()))
    }

    async fn put(&self, entity: &MediaEntity) -> Result<()> {
        self.entries
            .insert(entity.relative_path.clone(), entity.clone());
        Ok(())
    }

    async fn invalidate(&self, relative_path: &str) -> Result<()> {
        self.entries.remove(relative_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use reelhouse_model::{EventId, MediaEventKind};

    fn event_at(path: &str, occurred_at: DateTime<Utc>) -> MediaEvent {
        MediaEvent {
            id: EventId::new(),
            kind: MediaEventKind::Delete,
            relative_path: path.to_string(),
            entity_id: None,
            occurred_at,
        }
    }

    #[tokio::test]
    async fn events_since_is_exclusive_and_paged() {
        let store = InMemoryEventStore::new();
        let base = Utc::now();
        for (idx, path) in ["a", "b", "c", "d"].iter().enumerate() {
            store
                .append(&event_at(path, base + ChronoDuration::seconds(idx as i64)))
                .await
                .unwrap();
        }

        let first = store.events_since(base, Page::new(2, 0)).await.unwrap();
        let second = store.events_since(base, Page::new(2, 2)).await.unwrap();

        let paths: Vec<_> = first
            .iter()
            .chain(second.iter())
            .map(|e| e.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn prune_drops_only_old_events() {
        let store = InMemoryEventStore::new();
        let now = Utc::now();
        store
            .append(&event_at("old", now - ChronoDuration::days(40)))
            .await
            .unwrap();
        store.append(&event_at("new", now)).await.unwrap();

        let removed = store
            .prune_before(now - ChronoDuration::days(30))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = InMemoryJobStore::new();
        let job = TranscodeJob::queued(JobId::from_path_key("Movies/X.avi"), "in", "out", "p");
        store.upsert(&job).await.unwrap();

        assert!(
            store
                .transition(&job.job_id, JobStatus::Queued, JobStatus::Running)
                .await
                .unwrap()
        );
        assert!(
            !store
                .transition(&job.job_id, JobStatus::Queued, JobStatus::Running)
                .await
                .unwrap()
        );
        assert_eq!(store.count_by_status(JobStatus::Running).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn eta_is_not_written_back_onto_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let job = TranscodeJob::queued(JobId::from_path_key("Movies/X.avi"), "in", "out", "p");
        store.upsert(&job).await.unwrap();
        store
            .transition(&job.job_id, JobStatus::Queued, JobStatus::Running)
            .await
            .unwrap();
        store
            .record_eta(&job.job_id, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store
            .transition(&job.job_id, JobStatus::Running, JobStatus::Succeeded)
            .await
            .unwrap();

        store
            .record_eta(&job.job_id, Some(Duration::from_secs(30)))
            .await
            .unwrap();

        let stored = store.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Succeeded);
        assert_eq!(stored.eta, None);
    }
}
