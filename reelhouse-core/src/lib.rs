//! Core library for the Reelhouse media catalog.
//!
//! - [`classifier`] maps library paths onto the movie/series/season/episode
//!   hierarchy.
//! - [`watcher`] observes the library roots and announces files once they
//!   have finished being written.
//! - [`ingestion`] turns those announcements into catalog entities and
//!   change events.
//! - [`scheduler`] drives transcode jobs on an external executor and feeds
//!   finished outputs back into ingestion.
//!
//! Everything external sits behind the traits in [`ports`]; [`adapters`]
//! carries in-memory, process, Postgres and Redis implementations.
#![allow(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod active;
pub mod adapters;
pub mod classifier;
pub mod error;
pub mod ingestion;
pub mod periodic;
pub mod ports;
pub mod scheduler;
pub mod watcher;

pub use active::ActivePaths;
pub use classifier::{LibraryRoots, MediaPath, PathClassifier, conversion_output};
pub use error::{ClassificationError, ExecutorError, MediaError, ProviderError, Result};
pub use ingestion::{
    EventRetention, IngestionPipeline, IngestionPorts, LibraryEventRouter, LibraryInitializer,
    MaintenanceConfig, MetadataRefresher,
};
pub use scheduler::{SchedulerConfig, TranscodeJobScheduler, TranscodePolicy};
#[cfg(feature = "watch")]
pub use watcher::DirectoryWatcher;
pub use watcher::{DirectoryObserver, WatchEventKind, WatcherConfig};

/// Embedded schema migrations for the Postgres stores.
#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
