pub mod health;
pub mod sessions;

use axum::{routing::get, Router};

use sessions::AppState;

/// All API routes with their shared state applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route(
            "/api/v1/sessions/:year/:event/:session_type",
            get(sessions::get_session),
        )
        .route(
            "/api/v1/sessions/:year/:event/:session_type/views",
            get(sessions::get_session_views),
        )
        .with_state(state)
}
