pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs/structure/{structure_id}            create from identifier (POST)
/// /jobs/pores/{structure_id}                create for the pore tool (POST)
/// /jobs/upload                              create from upload (POST, multipart)
/// /jobs/auto/{structure_id}                 create and run with defaults (POST)
/// /jobs/{id}                                status (GET), delete (DELETE)
/// /jobs/{id}/info                           computation details (GET)
/// /jobs/{id}/data                           download an artifact (GET)
/// /jobs/{id}/submit/mole                    submit the channel tool (POST)
/// /jobs/{id}/submit/pores                   submit the pore tool (POST)
/// /jobs/{id}/kill                           terminate the running process (POST)
///
/// /summary                                  working directory statistics (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Computation lifecycle.
        .nest("/jobs", jobs::router())
        // Aggregate statistics.
        .route("/summary", get(handlers::summary::get_summary))
}
