use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Tool processes currently registered.
    pub running_computations: usize,
    /// Configured ceiling on concurrent processes.
    pub max_concurrent_computations: usize,
}

/// GET /health -- returns service health and process load.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let running_computations = state.manager.registry().len();
    let max_concurrent_computations = state.manager.config().max_concurrent;

    let status = if running_computations < max_concurrent_computations {
        "ok"
    } else {
        "busy"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        running_computations,
        max_concurrent_computations,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
