pub mod v1;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::health;
use crate::infra::app_state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", v1::create_v1_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
