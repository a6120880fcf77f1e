use axum::{
    Json,
    extract::{Query, State},
};
use reelhouse_model::MediaEntity;
use serde::Deserialize;
use tracing::warn;

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    /// Library-relative path, e.g. `Series/Show/Season 1/Episode 1.mkv`.
    pub path: String,
}

/// Looks an entity up by relative path, cache first.
pub async fn get_media_handler(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
) -> AppResult<Json<MediaEntity>> {
    let path = query.path.trim_matches('/');
    if path.is_empty() {
        return Err(AppError::bad_request("path must not be empty"));
    }

    match state.cache().get(path).await {
        Ok(Some(entity)) => return Ok(Json(entity)),
        Ok(None) => {}
        Err(err) => warn!(path, "cache lookup failed: {err}"),
    }

    let entity = state
        .media()
        .get_by_path(path)
        .await?
        .ok_or_else(|| AppError::not_found(format!("no media at {path}")))?;

    if let Err(err) = state.cache().put(&entity).await {
        warn!(path, "failed to populate cache: {err}");
    }
    Ok(Json(entity))
}
