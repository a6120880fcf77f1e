use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use reelhouse_model::{JobId, JobRequest, JobStatus, TranscodeJob};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

const ALL_STATUSES: [JobStatus; 4] = [
    JobStatus::Queued,
    JobStatus::Running,
    JobStatus::Succeeded,
    JobStatus::Failed,
];

#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub processed: usize,
}

pub async fn list_jobs_handler(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> AppResult<Json<Vec<TranscodeJob>>> {
    let statuses = match query.status.as_deref() {
        Some(raw) => vec![
            raw.parse::<JobStatus>()
                .map_err(|err| AppError::bad_request(err.to_string()))?,
        ],
        None => ALL_STATUSES.to_vec(),
    };

    let mut jobs = Vec::new();
    for status in statuses {
        jobs.extend(state.jobs().list_by_status(status, query.limit).await?);
    }
    Ok(Json(jobs))
}

pub async fn submit_job_handler(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    let job_id = state.scheduler.submit_job(request).await?;
    info!(%job_id, "job submitted over HTTP");
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// Runs a launch scan now instead of waiting for the next tick.
pub async fn scan_jobs_handler(State(state): State<AppState>) -> AppResult<Json<ScanResponse>> {
    let processed = state.scheduler.scan_queued_jobs().await?;
    Ok(Json(ScanResponse { processed }))
}

/// Runs a status scan now.
pub async fn update_status_handler(
    State(state): State<AppState>,
) -> AppResult<Json<ScanResponse>> {
    let processed = state.scheduler.update_job_status().await?;
    Ok(Json(ScanResponse { processed }))
}
