//! Capabilities the core consumes. Each port is an object-safe async trait so
//! adapters can be swapped behind `Arc<dyn _>`.

pub mod cache;
pub mod events;
pub mod executor;
pub mod ingest;
pub mod jobs;
pub mod media;
pub mod notifier;
pub mod provider;

pub use cache::MediaCache;
pub use events::EventStore;
pub use executor::{ExecutorStatus, TranscodeExecutor};
pub use ingest::MediaIngest;
pub use jobs::JobStore;
pub use media::MediaStore;
pub use notifier::Notifier;
pub use provider::MetadataProvider;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}
