use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Utc};
use reelhouse_core::ports::Page;
use reelhouse_model::MediaEvent;
use serde::Deserialize;

use crate::infra::{app_state::AppState, errors::AppResult};

const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Exclusive lower bound. Omitted means the whole log.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl EventsQuery {
    fn page(&self) -> Page {
        let default = Page::default();
        Page::new(
            self.limit.unwrap_or(default.limit).clamp(1, MAX_PAGE_SIZE),
            self.offset.unwrap_or(default.offset),
        )
    }
}

/// Change-log entries newer than `since`, oldest first.
pub async fn events_since_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Json<Vec<MediaEvent>>> {
    let since = query.since.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let events = state.events().events_since(since, query.page()).await?;
    Ok(Json(events))
}
