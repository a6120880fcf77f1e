use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelhouse_model::{EventId, MediaEntityId, MediaEvent, MediaEventKind};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::column_error;
use crate::error::{MediaError, Result};
use crate::ports::{EventStore, Page};

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<MediaEvent> {
        let id: Uuid = row.try_get("id").map_err(|e| column_error("id", e))?;
        let kind: String = row.try_get("kind").map_err(|e| column_error("kind", e))?;
        let entity_id: Option<Uuid> = row
            .try_get("entity_id")
            .map_err(|e| column_error("entity_id", e))?;

        Ok(MediaEvent {
            id: EventId(id),
            kind: kind.parse::<MediaEventKind>()?,
            relative_path: row
                .try_get("relative_path")
                .map_err(|e| column_error("relative_path", e))?,
            entity_id: entity_id.map(MediaEntityId),
            occurred_at: row
                .try_get("occurred_at")
                .map_err(|e| column_error("occurred_at", e))?,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, event: &MediaEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_events (id, kind, relative_path, entity_id, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.id.to_uuid())
        .bind(event.kind.as_str())
        .bind(&event.relative_path)
        .bind(event.entity_id.map(|id| id.to_uuid()))
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to append media event: {e}")))?;

        Ok(())
    }

    async fn events_since(&self, since: DateTime<Utc>, page: Page) -> Result<Vec<MediaEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, relative_path, entity_id, occurred_at
            FROM media_events
            WHERE occurred_at > $1
            ORDER BY occurred_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(since)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to load media events: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM media_events WHERE occurred_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to prune media events: {e}")))?;

        Ok(result.rows_affected())
    }
}
