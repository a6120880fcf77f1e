use std::time::Duration;

use async_trait::async_trait;
use reelhouse_model::{JobId, JobStatus, TranscodeJob};

use crate::error::Result;

/// Transcode job records.
///
/// Status changes go through [`JobStore::transition`], a compare-and-set, so
/// concurrent scans can never apply the same transition twice.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace by job id.
    async fn upsert(&self, job: &TranscodeJob) -> Result<()>;

    async fn get(&self, job_id: &JobId) -> Result<Option<TranscodeJob>>;

    /// Jobs in `status`, oldest submission first.
    async fn list_by_status(&self, status: JobStatus, limit: Option<u32>) -> Result<Vec<TranscodeJob>>;

    async fn count_by_status(&self, status: JobStatus) -> Result<u64>;

    /// Moves `job_id` from `expected` to `next`. Returns false when the
    /// stored status was not `expected`.
    async fn transition(&self, job_id: &JobId, expected: JobStatus, next: JobStatus) -> Result<bool>;

    /// Updates only the ETA, and only while the job is `Running`.
    async fn record_eta(&self, job_id: &JobId, eta: Option<Duration>) -> Result<()>;

    async fn remove(&self, job_id: &JobId) -> Result<bool>;

    /// Every job in `Queued` or `Running`.
    async fn list_active(&self) -> Result<Vec<TranscodeJob>>;
}
