//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{artifacts, jobs};
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /structure/{structure_id}  -> create_from_identifier
/// POST   /pores/{structure_id}      -> create_pores
/// POST   /upload                    -> upload_structure
/// POST   /auto/{structure_id}       -> run_default
/// GET    /{id}                      -> get_status
/// DELETE /{id}                      -> delete_job
/// GET    /{id}/info                 -> get_info
/// GET    /{id}/data                 -> get_data
/// POST   /{id}/submit/mole          -> submit_mole
/// POST   /{id}/submit/pores         -> submit_pores
/// POST   /{id}/kill                 -> kill_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/structure/{structure_id}", post(jobs::create_from_identifier))
        .route("/pores/{structure_id}", post(jobs::create_pores))
        .route("/upload", post(jobs::upload_structure))
        .route("/auto/{structure_id}", post(jobs::run_default))
        .route("/{id}", get(jobs::get_status).delete(jobs::delete_job))
        .route("/{id}/info", get(jobs::get_info))
        .route("/{id}/data", get(artifacts::get_data))
        .route("/{id}/submit/mole", post(jobs::submit_mole))
        .route("/{id}/submit/pores", post(jobs::submit_pores))
        .route("/{id}/kill", post(jobs::kill_job))
}
