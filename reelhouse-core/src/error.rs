use reelhouse_model::{JobId, ModelError};
use thiserror::Error;

/// Why a path could not be mapped onto the media hierarchy. Permanent: the
/// same path always fails the same way, so callers drop rather than retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("empty media path")]
    Empty,

    #[error("{path} is outside every configured library root")]
    OutsideLibrary { path: String },

    #[error("{path} is a category root, not a media item")]
    CategoryRoot { path: String },

    #[error("unknown category {category:?} in {path}")]
    UnknownCategory { category: String, path: String },

    #[error("no `Season <N>` number in {segment:?} ({path})")]
    MissingSeasonNumber { segment: String, path: String },

    #[error("no episode number in file name {file_name:?} ({path})")]
    MissingEpisodeNumber { file_name: String, path: String },
}

/// Metadata lookup failure. Enrichment is best effort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no metadata found for {0}")]
    NotFound(String),

    #[error("metadata provider unavailable: {0}")]
    Unavailable(String),

    #[error("metadata provider transport failure: {0}")]
    Transport(String),
}

/// Failure talking to the external job runner.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("executor already has a job named {0}")]
    AlreadyExists(JobId),

    #[error("executor has no job named {0}")]
    NotFound(JobId),

    #[error("failed to launch job {job_id}: {reason}")]
    Launch { job_id: JobId, reason: String },

    #[error("executor IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("executor backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Classification error: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Media not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ModelError> for MediaError {
    fn from(err: ModelError) -> Self {
        MediaError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
