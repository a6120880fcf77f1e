use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug)]
pub enum ModelError {
    InvalidMediaType(String),
    InvalidJobStatus(String),
    InvalidEventKind(String),
    InvalidJobId(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidMediaType(raw) => {
                write!(f, "invalid media type: {raw}")
            }
            ModelError::InvalidJobStatus(raw) => {
                write!(f, "invalid job status: {raw}")
            }
            ModelError::InvalidEventKind(raw) => {
                write!(f, "invalid event kind: {raw}")
            }
            ModelError::InvalidJobId(raw) => write!(f, "invalid job id: {raw:?}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
