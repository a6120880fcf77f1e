//! PostgreSQL-backed stores. Queries are built at runtime so the crate
//! compiles without a live database.

mod events;
mod jobs;
mod media;

pub use events::PostgresEventStore;
pub use jobs::PostgresJobStore;
pub use media::PostgresMediaStore;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::error::{MediaError, Result};

/// Opens a pool and applies the bundled migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL database");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to connect to PostgreSQL: {e}")))?;

    crate::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to run migrations: {e}")))?;

    info!("PostgreSQL ready");
    Ok(pool)
}

pub(crate) fn column_error(column: &str, err: sqlx::Error) -> MediaError {
    MediaError::Persistence(format!("Failed to read {column}: {err}"))
}
