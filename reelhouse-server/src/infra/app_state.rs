use std::{fmt, sync::Arc};

use reelhouse_core::ports::{EventStore, JobStore, MediaCache, MediaStore};
use reelhouse_core::{DirectoryWatcher, IngestionPipeline, TranscodeJobScheduler};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub scheduler: Arc<TranscodeJobScheduler>,
    pub watcher: Arc<DirectoryWatcher>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn media(&self) -> &Arc<dyn MediaStore> {
        &self.pipeline.ports().media
    }

    pub fn cache(&self) -> &Arc<dyn MediaCache> {
        &self.pipeline.ports().cache
    }

    pub fn events(&self) -> &Arc<dyn EventStore> {
        &self.pipeline.ports().events
    }

    pub fn jobs(&self) -> &Arc<dyn JobStore> {
        self.scheduler.jobs()
    }
}
