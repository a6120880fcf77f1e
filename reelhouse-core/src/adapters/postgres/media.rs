use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelhouse_model::{MediaEntity, MediaEntityId, MediaMetadata, MediaType};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::column_error;
use crate::error::{MediaError, Result};
use crate::ports::{MediaStore, Page};

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        relative_path,
        absolute_path,
        file_name,
        media_type,
        season_number,
        episode_number,
        metadata,
        parent_id,
        size_bytes,
        created_at,
        updated_at
    FROM media_entities
"#;

#[derive(Debug, Clone)]
pub struct PostgresMediaStore {
    pool: PgPool,
}

impl PostgresMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<MediaEntity> {
        let id: Uuid = row.try_get("id").map_err(|e| column_error("id", e))?;
        let media_type: String = row
            .try_get("media_type")
            .map_err(|e| column_error("media_type", e))?;
        let season_number: Option<i32> = row
            .try_get("season_number")
            .map_err(|e| column_error("season_number", e))?;
        let episode_number: Option<i32> = row
            .try_get("episode_number")
            .map_err(|e| column_error("episode_number", e))?;
        let metadata: Option<serde_json::Value> = row
            .try_get("metadata")
            .map_err(|e| column_error("metadata", e))?;
        let parent_id: Option<Uuid> = row
            .try_get("parent_id")
            .map_err(|e| column_error("parent_id", e))?;
        let size_bytes: Option<i64> = row
            .try_get("size_bytes")
            .map_err(|e| column_error("size_bytes", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| column_error("created_at", e))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| column_error("updated_at", e))?;

        let metadata = metadata
            .map(serde_json::from_value::<MediaMetadata>)
            .transpose()?;

        Ok(MediaEntity {
            id: MediaEntityId(id),
            relative_path: row
                .try_get("relative_path")
                .map_err(|e| column_error("relative_path", e))?,
            absolute_path: row
                .try_get("absolute_path")
                .map_err(|e| column_error("absolute_path", e))?,
            file_name: row
                .try_get("file_name")
                .map_err(|e| column_error("file_name", e))?,
            media_type: media_type.parse::<MediaType>()?,
            season_number: season_number.map(|n| n as u32),
            episode_number: episode_number.map(|n| n as u32),
            metadata,
            parent_id: parent_id.map(MediaEntityId),
            size_bytes: size_bytes.map(|n| n as u64),
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl MediaStore for PostgresMediaStore {
    async fn get_by_path(&self, relative_path: &str) -> Result<Option<MediaEntity>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE relative_path = $1"))
            .bind(relative_path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to load {relative_path}: {e}")))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get(&self, id: MediaEntityId) -> Result<Option<MediaEntity>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.to_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to load media {id}: {e}")))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn save(&self, entity: &MediaEntity) -> Result<()> {
        let metadata = entity
            .metadata
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO media_entities (
                id, relative_path, absolute_path, file_name, media_type,
                season_number, episode_number, metadata, parent_id, size_bytes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (relative_path) DO UPDATE SET
                absolute_path = EXCLUDED.absolute_path,
                file_name = EXCLUDED.file_name,
                media_type = EXCLUDED.media_type,
                season_number = EXCLUDED.season_number,
                episode_number = EXCLUDED.episode_number,
                metadata = EXCLUDED.metadata,
                parent_id = EXCLUDED.parent_id,
                size_bytes = EXCLUDED.size_bytes,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(entity.id.to_uuid())
        .bind(&entity.relative_path)
        .bind(&entity.absolute_path)
        .bind(&entity.file_name)
        .bind(entity.media_type.as_str())
        .bind(entity.season_number.map(|n| n as i32))
        .bind(entity.episode_number.map(|n| n as i32))
        .bind(metadata)
        .bind(entity.parent_id.map(|id| id.to_uuid()))
        .bind(entity.size_bytes.map(|n| n as i64))
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MediaError::Persistence(format!("Failed to save {}: {e}", entity.relative_path))
        })?;

        Ok(())
    }

    async fn delete_by_path(&self, relative_path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM media_entities WHERE relative_path = $1")
            .bind(relative_path)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MediaError::Persistence(format!("Failed to delete {relative_path}: {e}"))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_stale(&self, older_than: DateTime<Utc>, limit: u32) -> Result<Vec<MediaEntity>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE updated_at < $1 ORDER BY updated_at ASC LIMIT $2"
        ))
        .bind(older_than)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to load stale media: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn list(&self, page: Page) -> Result<Vec<MediaEntity>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY relative_path ASC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to list media: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }
}
