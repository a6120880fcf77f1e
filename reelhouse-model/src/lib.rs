//! Core data model definitions shared across Reelhouse crates.
#![allow(missing_docs)]

pub use ::chrono;

pub mod entity;
pub mod error;
pub mod events;
pub mod ids;
pub mod jobs;
pub mod media_type;
pub mod metadata;

// Curated re-exports for downstream consumers.
pub use entity::MediaEntity;
pub use error::{ModelError, Result as ModelResult};
pub use events::{MediaEvent, MediaEventKind};
pub use ids::{EventId, JobId, MediaEntityId};
pub use jobs::{JobRequest, JobStatus, TranscodeJob};
pub use media_type::MediaType;
pub use metadata::MediaMetadata;
