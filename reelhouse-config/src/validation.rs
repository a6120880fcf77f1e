use thiserror::Error;

use crate::models::Config;

/// Settings the runtime cannot start with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("scheduler.concurrency_limit must be at least 1")]
    ZeroConcurrency,
    #[error("watcher.stability_poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
    #[error("library root {root} is not absolute")]
    RelativeRoot { root: String },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.scheduler.concurrency_limit == 0 {
        return Err(ConfigGuardRailError::ZeroConcurrency);
    }
    if config.watcher.stability_poll_interval_ms == 0 {
        return Err(ConfigGuardRailError::ZeroPollInterval);
    }

    let intervals = [
        ("scheduler.launch_interval_secs", config.scheduler.launch_interval_secs),
        ("scheduler.status_interval_secs", config.scheduler.status_interval_secs),
        ("scheduler.eta_interval_secs", config.scheduler.eta_interval_secs),
        ("maintenance.refresh_interval_secs", config.maintenance.refresh_interval_secs),
        ("maintenance.retention_interval_secs", config.maintenance.retention_interval_secs),
    ];
    if let Some(&(field, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
        return Err(ConfigGuardRailError::ZeroInterval { field });
    }

    if let Some(root) = config.library.roots.iter().find(|root| !root.is_absolute()) {
        return Err(ConfigGuardRailError::RelativeRoot {
            root: root.display().to_string(),
        });
    }

    if config.library.roots.is_empty() {
        warnings.push_with_hint(
            "No library roots configured; nothing will be watched or catalogued",
            "Set MEDIA_ROOTS or add `roots` to the [library] section",
        );
    }

    for root in &config.library.roots {
        if !root.is_dir() {
            warnings.push(format!(
                "Library root {} does not exist or is not a directory",
                root.display()
            ));
        }
    }

    if config.transcode.policy.enabled && config.transcode.policy.extensions.is_empty() {
        warnings.push_with_hint(
            "Transcoding is enabled but no source extensions are listed",
            "Add `extensions` to the [transcode] section",
        );
    }

    if config.database.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; the catalog is kept in memory and lost on restart",
            "Set DATABASE_URL or add a [database] section",
        );
    }

    Ok(warnings)
}
