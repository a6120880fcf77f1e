use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reelhouse_model::JobId;
use serde::Serialize;

use crate::error::ExecutorError;

/// Job state as reported by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutorStatus {
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for ExecutorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorStatus::Running => f.write_str("RUNNING"),
            ExecutorStatus::Succeeded => f.write_str("SUCCEEDED"),
            ExecutorStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// External job runner that performs the actual transcode.
///
/// The job id is the executor-side job name; launching a name that already
/// exists fails with [`ExecutorError::AlreadyExists`].
#[async_trait]
pub trait TranscodeExecutor: Send + Sync {
    async fn launch(
        &self,
        job_id: &JobId,
        input_file: &str,
        output_file: &str,
        preset: &str,
    ) -> Result<(), ExecutorError>;

    /// `None` when the executor does not know the job.
    async fn status(&self, job_id: &JobId) -> Result<Option<ExecutorStatus>, ExecutorError>;

    /// Estimated remaining time, when the runner exposes one.
    async fn eta(&self, job_id: &JobId) -> Result<Option<Duration>, ExecutorError>;

    /// Releases the executor-side job.
    async fn delete(&self, job_id: &JobId) -> Result<(), ExecutorError>;
}
