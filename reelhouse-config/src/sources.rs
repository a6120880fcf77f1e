use std::path::PathBuf;

use reelhouse_core::{MaintenanceConfig, SchedulerConfig, TranscodePolicy, WatcherConfig};
use serde::{Deserialize, Serialize};

use crate::util::{parse_bool_var, parse_path_list_var};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub library: FileLibraryConfig,
    pub watcher: Option<WatcherConfig>,
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub transcode: FileTranscodeConfig,
    #[serde(default)]
    pub maintenance: FileMaintenanceConfig,
    pub database: Option<FileDatabaseConfig>,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub notifications: FileNotificationConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLibraryConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_extensions: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTranscodeConfig {
    #[serde(flatten)]
    pub policy: TranscodePolicy,
    /// Converter binary; overrides the command file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// TOML or JSON file holding `program` and `args`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_file: Option<PathBuf>,
}

/// Maintenance knobs. The humantime strings, when present, win over the
/// matching `_secs` fields.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMaintenanceConfig {
    #[serde(flatten)]
    pub base: MaintenanceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_max_age: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
    /// Humantime expiry, e.g. `6h`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileNotificationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub media_roots: Option<Vec<PathBuf>>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub transcode_enabled: Option<bool>,
    pub transcode_concurrency: Option<u32>,
    pub transcode_command_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("REELHOUSE_CONFIG").map(PathBuf::from),
            server_host: non_empty_var("SERVER_HOST"),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            media_roots: parse_path_list_var("MEDIA_ROOTS"),
            database_url: non_empty_var("DATABASE_URL"),
            redis_url: non_empty_var("REDIS_URL"),
            transcode_enabled: parse_bool_var("TRANSCODE_ENABLED"),
            transcode_concurrency: std::env::var("TRANSCODE_CONCURRENCY")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            transcode_command_path: non_empty_var("TRANSCODE_COMMAND_PATH")
                .map(PathBuf::from),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
