use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use reelhouse_core::adapters::ProcessExecutorConfig;
use reelhouse_core::{MaintenanceConfig, SchedulerConfig, TranscodePolicy, WatcherConfig};
use serde::{Deserialize, Serialize};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub library: LibraryConfig,
    pub watcher: WatcherConfig,
    pub scheduler: SchedulerConfig,
    pub transcode: TranscodeConfig,
    pub maintenance: MaintenanceConfig,
    /// `None` keeps the catalog in memory.
    pub database: Option<DatabaseConfig>,
    /// `None` uses the in-process lookup cache.
    pub redis: Option<RedisConfig>,
    pub notifications: NotificationConfig,
    /// File the values were read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Socket address for the admin listener. Falls back to the unspecified
    /// address when `host` is not an IP literal.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.port)
    }
}

/// Library roots and the file extensions that count as video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    pub roots: Vec<PathBuf>,
    /// Empty means the built-in list.
    pub video_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeConfig {
    pub policy: TranscodePolicy,
    pub command: ProcessExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Expiry applied to cached entities. `None` keeps them until
    /// invalidated.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Log catalogue changes through the notifier port.
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
