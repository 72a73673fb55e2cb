use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::routes::sessions::AppState;
use crate::services::trend::TRENDLINE_AVAILABLE;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status, always "ok" when the server answers
    pub status: String,
    /// API version
    pub version: String,
    /// Sessions held in the in-memory cache
    pub cached_sessions: usize,
    /// Whether this build computes lap time vs track temperature trend lines
    pub trendline_available: bool,
}

/// Health check endpoint.
///
/// Returns the API status and version. The session provider is not
/// contacted; a provider outage shows up as 502 on the session endpoints.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_sessions: state.loader.cache().len(),
        trendline_available: TRENDLINE_AVAILABLE,
    })
}
