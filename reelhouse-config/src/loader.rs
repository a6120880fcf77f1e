use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use reelhouse_core::adapters::ProcessExecutorConfig;
use thiserror::Error;

use crate::command;
use crate::models::{
    Config, DatabaseConfig, LibraryConfig, NotificationConfig, RedisConfig, ServerConfig,
    TranscodeConfig,
};
use crate::sources::{EnvConfig, FileConfig, FileMaintenanceConfig, FileTranscodeConfig};
use crate::util::parse_duration;
use crate::validation::{self, ConfigGuardRailError, ConfigWarnings};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("reelhouse.toml"),
        PathBuf::from("config/reelhouse.toml"),
    ]
});

const DEFAULT_DATABASE_CONNECTIONS: u32 = 10;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Seeds the process environment from `.env` (when present), then
    /// resolves the file and environment layers.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };
        if env_file_loaded {
            tracing::debug!("environment seeded from .env");
        }

        self.load_with_env(EnvConfig::gather())
    }

    /// Resolves configuration against an already gathered environment.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = self.compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(explicit) = &self.options.config_path {
            (explicit.clone(), true)
        } else if let Some(from_env) = &env.config_path {
            (from_env.clone(), true)
        } else {
            match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => (found.clone(), false),
                None => return Ok((None, None)),
            }
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
            path: path.clone(),
            source: err,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No reelhouse.toml detected; using environment variables and defaults",
                "Create reelhouse.toml or point REELHOUSE_CONFIG at one",
            );
        }

        let FileConfig {
            server: file_server,
            library: file_library,
            watcher: file_watcher,
            scheduler: file_scheduler,
            transcode: file_transcode,
            maintenance: file_maintenance,
            database: file_database,
            redis: file_redis,
            notifications: file_notifications,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| ServerConfig::default().host),
            port: env
                .server_port
                .or(file_server.port)
                .unwrap_or(ServerConfig::default().port),
        };

        let library = LibraryConfig {
            roots: env.media_roots.clone().unwrap_or(file_library.roots),
            video_extensions: file_library.video_extensions.unwrap_or_default(),
        };

        let mut scheduler = file_scheduler.unwrap_or_default();
        if let Some(limit) = env.transcode_concurrency {
            scheduler.concurrency_limit = limit;
        }

        let transcode = resolve_transcode(file_transcode, &env)?;
        let maintenance = resolve_maintenance(file_maintenance)?;

        let database = match (env.database_url.clone(), file_database) {
            (Some(url), file) => Some(DatabaseConfig {
                url,
                max_connections: file
                    .and_then(|db| db.max_connections)
                    .unwrap_or(DEFAULT_DATABASE_CONNECTIONS),
            }),
            (None, Some(file)) => file.url.map(|url| DatabaseConfig {
                url,
                max_connections: file.max_connections.unwrap_or(DEFAULT_DATABASE_CONNECTIONS),
            }),
            (None, None) => None,
        };

        let redis = match (env.redis_url.clone(), file_redis) {
            (Some(url), file) => Some(RedisConfig {
                url,
                ttl: parse_optional_duration("redis.ttl", file.and_then(|r| r.ttl))?,
            }),
            (None, Some(file)) => Some(RedisConfig {
                url: file.url,
                ttl: parse_optional_duration("redis.ttl", file.ttl)?,
            }),
            (None, None) => None,
        };

        let notifications = NotificationConfig {
            enabled: file_notifications
                .enabled
                .unwrap_or(NotificationConfig::default().enabled),
        };

        let config = Config {
            server,
            library,
            watcher: file_watcher.unwrap_or_default(),
            scheduler,
            transcode,
            maintenance,
            database,
            redis,
            notifications,
            source_path: config_path,
        };

        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok((config, warnings))
    }
}

fn resolve_transcode(
    file: FileTranscodeConfig,
    env: &EnvConfig,
) -> Result<TranscodeConfig, ConfigLoadError> {
    let FileTranscodeConfig {
        mut policy,
        program,
        args,
        command_file,
    } = file;

    if let Some(enabled) = env.transcode_enabled {
        policy.enabled = enabled;
    }

    let mut command = match env.transcode_command_path.as_ref().or(command_file.as_ref()) {
        Some(path) => command::load_from_file(path).map_err(ConfigLoadError::Command)?,
        None => ProcessExecutorConfig::default(),
    };
    if let Some(program) = program {
        command.program = program;
    }
    if let Some(args) = args {
        command.args = args;
    }

    Ok(TranscodeConfig { policy, command })
}

fn resolve_maintenance(file: FileMaintenanceConfig) -> Result<reelhouse_core::MaintenanceConfig, ConfigLoadError> {
    let FileMaintenanceConfig {
        mut base,
        refresh_interval,
        update_frequency,
        retention_interval,
        event_max_age,
    } = file;

    let overrides = [
        ("maintenance.refresh_interval", refresh_interval, &mut base.refresh_interval_secs),
        ("maintenance.update_frequency", update_frequency, &mut base.update_frequency_secs),
        ("maintenance.retention_interval", retention_interval, &mut base.retention_interval_secs),
        ("maintenance.event_max_age", event_max_age, &mut base.event_max_age_secs),
    ];
    for (field, raw, target) in overrides {
        if let Some(duration) = parse_optional_duration(field, raw)? {
            *target = duration.as_secs();
        }
    }

    Ok(base)
}

fn parse_optional_duration(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|raw| {
        parse_duration(&raw).map_err(|source| ConfigLoadError::Duration {
            field,
            value: raw.clone(),
            source,
        })
    })
    .transpose()
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration '{value}' for {field}")]
    Duration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("failed to load converter command: {0}")]
    Command(#[source] anyhow::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    /// Emits every warning through `tracing`.
    pub fn log_warnings(&self) {
        for warning in self.warnings.iter() {
            match &warning.hint {
                Some(hint) => tracing::warn!(hint = %hint, "{}", warning.message),
                None => tracing::warn!("{}", warning.message),
            }
        }
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.config.source_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("reelhouse.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn file_values_apply_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir(&media).unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[server]
port = 8080

[library]
roots = ["{}"]

[watcher]
stability_poll_interval_ms = 500

[scheduler]
concurrency_limit = 2

[transcode]
enabled = true
extensions = ["avi"]
program = "ffmpeg"

[maintenance]
update_frequency = "12h"
event_max_age_secs = 60

[redis]
url = "redis://localhost:6379"
ttl = "6h"
"#,
                media.display()
            ),
        );

        let load = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap();
        let config = load.config;

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.library.roots, vec![media]);
        assert_eq!(config.watcher.stability_poll_interval_ms, 500);
        assert_eq!(config.watcher.channel_capacity, 1024);
        assert_eq!(config.scheduler.concurrency_limit, 2);
        assert_eq!(config.scheduler.launch_interval_secs, 120);
        assert!(config.transcode.policy.enabled);
        assert_eq!(config.transcode.policy.extensions, vec!["avi"]);
        assert_eq!(config.transcode.command.program, "ffmpeg");
        assert_eq!(config.transcode.command.args, ProcessExecutorConfig::default().args);
        assert_eq!(config.maintenance.update_frequency_secs, 12 * 60 * 60);
        assert_eq!(config.maintenance.event_max_age_secs, 60);
        assert_eq!(config.maintenance.update_limit, 200);
        assert_eq!(
            config.redis.unwrap().ttl,
            Some(Duration::from_secs(6 * 60 * 60))
        );
        assert!(config.database.is_none());
        assert_eq!(config.source_path, Some(path));
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[server]
host = "127.0.0.1"
port = 8080

[database]
url = "postgres://file/reelhouse"
max_connections = 4

[scheduler]
concurrency_limit = 2
"#,
        );
        let env = EnvConfig {
            server_port: Some(9090),
            media_roots: Some(vec![dir.path().to_path_buf()]),
            database_url: Some("postgres://env/reelhouse".into()),
            transcode_enabled: Some(true),
            transcode_concurrency: Some(5),
            ..EnvConfig::default()
        };

        let config = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(env)
            .unwrap()
            .config;

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.library.roots, vec![dir.path().to_path_buf()]);
        assert!(config.transcode.policy.enabled);
        assert_eq!(config.scheduler.concurrency_limit, 5);
        assert_eq!(
            config.database,
            Some(DatabaseConfig {
                url: "postgres://env/reelhouse".into(),
                max_connections: 4,
            })
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .load_with_env(EnvConfig::default())
            .unwrap_err();

        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn env_config_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvConfig {
            config_path: Some(dir.path().join("absent.toml")),
            ..EnvConfig::default()
        };

        let err = ConfigLoader::new().load_with_env(env).unwrap_err();
        assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
    }

    #[test]
    fn malformed_toml_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server\nport = 1");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap_err();

        match err {
            ConfigLoadError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_duration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[maintenance]\nevent_max_age = \"a while\"\n");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigLoadError::Duration {
                field: "maintenance.event_max_age",
                ..
            }
        ));
    }

    #[test]
    fn zero_concurrency_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[scheduler]\nconcurrency_limit = 0\n");

        let err = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigLoadError::Invalid(ConfigGuardRailError::ZeroConcurrency)
        ));
    }

    #[test]
    fn command_file_supplies_converter() {
        let dir = tempfile::tempdir().unwrap();
        let command_path = dir.path().join("convert.toml");
        fs::write(&command_path, "program = \"ffmpeg\"\nargs = [\"{input}\"]\n").unwrap();
        let path = write_config(
            &dir,
            &format!("[transcode]\ncommand_file = \"{}\"\n", command_path.display()),
        );

        let config = ConfigLoader::new()
            .with_config_path(&path)
            .load_with_env(EnvConfig::default())
            .unwrap()
            .config;

        assert_eq!(config.transcode.command.program, "ffmpeg");
        assert_eq!(config.transcode.command.args, vec!["{input}"]);
    }
}
