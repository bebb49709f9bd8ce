use axum::extract::State;
use axum::Json;
use mole_core::summary::WorkspaceSummary;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/v1/summary
///
/// Counts sessions and computations in the working directory and ranks the
/// structures by use.
pub async fn get_summary(State(state): State<AppState>) -> AppResult<Json<WorkspaceSummary>> {
    Ok(Json(state.manager.summary().await?))
}
