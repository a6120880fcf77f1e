//! Directory watching with write-completion debounce.
//!
//! [`DirectoryWatcher`] keeps one non-recursive `notify` watch per directory
//! under the configured roots and extends coverage as directories appear.
//! File creates are held back until the file stops changing; directory
//! creates and every delete are delivered immediately. Each registered
//! [`DirectoryObserver`] is invoked on its own task.

pub mod stability;

#[cfg(feature = "watch")]
mod service;

#[cfg(feature = "watch")]
pub use service::DirectoryWatcher;
pub use stability::wait_for_write_complete;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Knobs for the directory watcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Delay between modification-time polls while waiting for a file to
    /// stop changing.
    pub stability_poll_interval_ms: u64,
    /// File names ending in any of these are never announced.
    pub ignored_suffixes: Vec<String>,
    /// Capacity of the channel between `notify` and the event loop.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            stability_poll_interval_ms: 3000,
            ignored_suffixes: vec!["partial~".to_string()],
            channel_capacity: 1024,
        }
    }
}

impl WatcherConfig {
    pub fn stability_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stability_poll_interval_ms)
    }

    /// True when the path's final component ends in an ignored suffix.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        self.ignored_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && name.ends_with(suffix.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    Created,
    Deleted,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchEventKind::Created => f.write_str("created"),
            WatchEventKind::Deleted => f.write_str("deleted"),
        }
    }
}

/// Receives stabilized filesystem changes. Errors are logged by the watcher
/// and never stop delivery to other observers.
#[async_trait]
pub trait DirectoryObserver: Send + Sync {
    async fn on_directory_event(&self, kind: WatchEventKind, path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_partial_downloads() {
        let config = WatcherConfig::default();
        assert!(config.is_ignored(Path::new("/media/Movies/Heat.mkv.partial~")));
        assert!(!config.is_ignored(Path::new("/media/Movies/Heat.mkv")));
        assert!(!config.is_ignored(Path::new("/")));
    }
}
