//! Concrete implementations of the [`crate::ports`] traits.

pub mod memory;
pub mod notifier;
pub mod process;
pub mod provider;

#[cfg(feature = "database")]
pub mod postgres;
#[cfg(feature = "database")]
pub mod redis_cache;

pub use memory::{InMemoryCache, InMemoryEventStore, InMemoryJobStore, InMemoryMediaStore};
pub use notifier::{LogNotifier, NoopNotifier};
pub use process::{ProcessExecutor, ProcessExecutorConfig};
pub use provider::UnavailableProvider;
