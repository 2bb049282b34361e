//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: status(&state).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    Json(ApiResponse::ok(DetailedHealthResponse {
        status: status(&state).to_string(),
        ws_connections: state.realtime.hub.connection_count(),
        online_users: state.realtime.hub.user_count(),
        metrics: state.realtime.metrics.snapshot(),
    }))
}

fn status(state: &AppState) -> &'static str {
    if state.realtime.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    }
}
