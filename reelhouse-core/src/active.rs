//! Paths the system is currently writing itself.
//!
//! Transcode inputs and outputs are registered here while their job is live so
//! the watcher's consumer can ignore the filesystem noise they generate. The
//! set is shared by cloning the handle; there is no process-wide instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;

#[derive(Debug, Clone, Default)]
pub struct ActivePaths {
    inner: Arc<DashSet<PathBuf>>,
}

impl ActivePaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the path was already active.
    pub fn insert(&self, path: impl Into<PathBuf>) -> bool {
        self.inner.insert(path.into())
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.inner.remove(path).is_some()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.contains(path)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
