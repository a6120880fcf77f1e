use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::JobId;

/// Lifecycle of a transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(ModelError::InvalidJobStatus(raw.to_string())),
        }
    }
}

/// Request to transcode one file into another.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobRequest {
    pub input_file: String,
    pub output_file: String,
    /// Falls back to the scheduler's default preset.
    #[cfg_attr(feature = "serde", serde(default))]
    pub preset: Option<String>,
    /// Falls back to an id derived from the input path.
    #[cfg_attr(feature = "serde", serde(default))]
    pub job_id: Option<JobId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TranscodeJob {
    pub job_id: JobId,
    pub input_file: String,
    pub output_file: String,
    pub preset: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde",
        serde(skip_serializing_if = "Option::is_none")
    )]
    pub eta: Option<Duration>,
}

impl TranscodeJob {
    pub fn queued(
        job_id: JobId,
        input_file: impl Into<String>,
        output_file: impl Into<String>,
        preset: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            input_file: input_file.into(),
            output_file: output_file.into(),
            preset: preset.into(),
            status: JobStatus::Queued,
            submitted_at: now,
            updated_at: now,
            eta: None,
        }
    }
}
