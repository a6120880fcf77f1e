use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{events, jobs, media};
use crate::infra::app_state::AppState;

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::events_since_handler))
        .route(
            "/jobs",
            get(jobs::list_jobs_handler).post(jobs::submit_job_handler),
        )
        .route("/jobs/scan", post(jobs::scan_jobs_handler))
        .route("/jobs/status", post(jobs::update_status_handler))
        .route("/media", get(media::get_media_handler))
}
