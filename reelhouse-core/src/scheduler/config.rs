use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Preset handed to the converter when a request names none.
pub const DEFAULT_PRESET: &str = "Chromecast 1080p60 Surround";

/// Timing and housekeeping for the transcode scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period of the launch scan.
    pub launch_interval_secs: u64,
    /// Period of the status scan.
    pub status_interval_secs: u64,
    pub eta_interval_secs: u64,
    /// Upper bound on jobs in `Running` at once.
    pub concurrency_limit: u32,
    pub default_preset: String,
    /// Keep terminal job records for audit instead of deleting them.
    pub retain_terminal_jobs: bool,
    pub delete_input_on_success: bool,
    /// Put a running job back in the queue when the executor no longer
    /// knows it, e.g. after the executor restarted.
    pub requeue_lost_jobs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            launch_interval_secs: 120,
            status_interval_secs: 10,
            eta_interval_secs: 10,
            concurrency_limit: 3,
            default_preset: DEFAULT_PRESET.to_string(),
            retain_terminal_jobs: true,
            delete_input_on_success: true,
            requeue_lost_jobs: true,
        }
    }
}

impl SchedulerConfig {
    pub fn launch_interval(&self) -> Duration {
        Duration::from_secs(self.launch_interval_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn eta_interval(&self) -> Duration {
        Duration::from_secs(self.eta_interval_secs)
    }
}

/// Which newly created files are converted instead of catalogued directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodePolicy {
    pub enabled: bool,
    /// Lower-case extensions, without the dot.
    pub extensions: Vec<String>,
}

impl Default for TranscodePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            extensions: ["avi", "wmv", "flv", "mpg", "mpeg", "mov"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl TranscodePolicy {
    pub fn applies_to(&self, extension: &str) -> bool {
        self.enabled
            && self
                .extensions
                .iter()
                .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}
