use axum::{Json, extract::State};
use reelhouse_model::JobStatus;
use serde::Serialize;

use crate::infra::{app_state::AppState, errors::AppResult};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub watched_directories: usize,
    pub queued_jobs: u64,
    pub running_jobs: u64,
}

pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let queued_jobs = state.jobs().count_by_status(JobStatus::Queued).await?;
    let running_jobs = state.jobs().count_by_status(JobStatus::Running).await?;

    Ok(Json(HealthResponse {
        status: "ok",
        watched_directories: state.watcher.watched_directories().await,
        queued_jobs,
        running_jobs,
    }))
}
