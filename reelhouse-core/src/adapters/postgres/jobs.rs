use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelhouse_model::{JobId, JobStatus, TranscodeJob};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::column_error;
use crate::error::{MediaError, Result};
use crate::ports::JobStore;

const SELECT_COLUMNS: &str = r#"
    SELECT job_id, input_file, output_file, preset, status, submitted_at, updated_at, eta_seconds
    FROM transcode_jobs
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<TranscodeJob> {
        let job_id: String = row.try_get("job_id").map_err(|e| column_error("job_id", e))?;
        let status: String = row.try_get("status").map_err(|e| column_error("status", e))?;
        let submitted_at: DateTime<Utc> = row
            .try_get("submitted_at")
            .map_err(|e| column_error("submitted_at", e))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| column_error("updated_at", e))?;
        let eta_seconds: Option<i64> = row
            .try_get("eta_seconds")
            .map_err(|e| column_error("eta_seconds", e))?;

        Ok(TranscodeJob {
            job_id: JobId::new(job_id)?,
            input_file: row
                .try_get("input_file")
                .map_err(|e| column_error("input_file", e))?,
            output_file: row
                .try_get("output_file")
                .map_err(|e| column_error("output_file", e))?,
            preset: row.try_get("preset").map_err(|e| column_error("preset", e))?,
            status: status.parse::<JobStatus>()?,
            submitted_at,
            updated_at,
            eta: eta_seconds.map(|secs| Duration::from_secs(secs.max(0) as u64)),
        })
    }
}

fn eta_seconds(eta: Option<Duration>) -> Option<i64> {
    eta.map(|eta| i64::try_from(eta.as_secs()).unwrap_or(i64::MAX))
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn upsert(&self, job: &TranscodeJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO transcode_jobs (
                job_id, input_file, output_file, preset, status,
                submitted_at, updated_at, eta_seconds
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (job_id) DO UPDATE SET
                input_file = EXCLUDED.input_file,
                output_file = EXCLUDED.output_file,
                preset = EXCLUDED.preset,
                status = EXCLUDED.status,
                submitted_at = EXCLUDED.submitted_at,
                updated_at = EXCLUDED.updated_at,
                eta_seconds = EXCLUDED.eta_seconds
            "#,
        )
        .bind(job.job_id.as_str())
        .bind(&job.input_file)
        .bind(&job.output_file)
        .bind(&job.preset)
        .bind(job.status.as_str())
        .bind(job.submitted_at)
        .bind(job.updated_at)
        .bind(eta_seconds(job.eta))
        .execute(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to save job {}: {e}", job.job_id)))?;

        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<TranscodeJob>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE job_id = $1"))
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to load job {job_id}: {e}")))?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn list_by_status(&self, status: JobStatus, limit: Option<u32>) -> Result<Vec<TranscodeJob>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = $1 ORDER BY submitted_at ASC, job_id ASC LIMIT $2"
        ))
        .bind(status.as_str())
        .bind(limit.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to list {status} jobs: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcode_jobs WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to count {status} jobs: {e}")))?;

        Ok(count.max(0) as u64)
    }

    async fn transition(&self, job_id: &JobId, expected: JobStatus, next: JobStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transcode_jobs
            SET status = $3,
                updated_at = NOW(),
                eta_seconds = CASE WHEN $4 THEN NULL ELSE eta_seconds END
            WHERE job_id = $1 AND status = $2
            "#,
        )
        .bind(job_id.as_str())
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(next.is_terminal())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MediaError::Persistence(format!(
                "Failed to move job {job_id} from {expected} to {next}: {e}"
            ))
        })?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_eta(&self, job_id: &JobId, eta: Option<Duration>) -> Result<()> {
        sqlx::query(
            "UPDATE transcode_jobs SET eta_seconds = $2 WHERE job_id = $1 AND status = $3",
        )
        .bind(job_id.as_str())
        .bind(eta_seconds(eta))
        .bind(JobStatus::Running.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to record eta for {job_id}: {e}")))?;

        Ok(())
    }

    async fn remove(&self, job_id: &JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM transcode_jobs WHERE job_id = $1")
            .bind(job_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| MediaError::Persistence(format!("Failed to delete job {job_id}: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<TranscodeJob>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('QUEUED', 'RUNNING') ORDER BY submitted_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MediaError::Persistence(format!("Failed to list active jobs: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }
}
