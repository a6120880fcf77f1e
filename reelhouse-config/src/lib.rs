//! Configuration loading for Reelhouse.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file
//! (`reelhouse.toml`), and environment variables (optionally seeded from a
//! `.env` file). See [`ConfigLoader`].
#![allow(missing_docs)]

pub mod command;
pub mod loader;
pub mod models;
pub mod sources;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, DatabaseConfig, LibraryConfig, NotificationConfig, RedisConfig, ServerConfig,
    TranscodeConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
