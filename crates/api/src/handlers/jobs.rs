//! Handlers for the `/jobs` resource.
//!
//! Lifecycle operations always answer `200 OK` with a [`JobReport`]; a
//! failure is carried in the report's `status` and `errorMessage`. Only the
//! lookup endpoints use HTTP error statuses.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::Json;
use mole_core::job::JobReport;
use mole_core::params::{MoleParameters, PoresRequest};
use mole_core::summary::JobInfo;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

const INPUT_FORMAT_ERROR: &str =
    "Input format error. Request's body could not be serialized, please fix the error and try again.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuery {
    pub assembly_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoQuery {
    pub ignore_het: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub submit_id: Option<u32>,
}

/// Parse a submission body; an empty body means default parameters.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/structure/{structure_id}?assemblyId=
///
/// Create a computation for a remote structure. Initialization continues in
/// the background; poll the status until it leaves `Initializing`.
pub async fn create_from_identifier(
    State(state): State<AppState>,
    Path(structure_id): Path<String>,
    Query(query): Query<CreateQuery>,
) -> Json<JobReport> {
    Json(
        state
            .manager
            .create_from_identifier(&structure_id, query.assembly_id.as_deref()),
    )
}

/// POST /api/v1/jobs/pores/{structure_id}
pub async fn create_pores(
    State(state): State<AppState>,
    Path(structure_id): Path<String>,
) -> Json<JobReport> {
    Json(state.manager.create_pores_from_identifier(&structure_id))
}

/// POST /api/v1/jobs/upload
///
/// Accepts a multipart form with a required `file` field holding the
/// structure.
pub async fn upload_structure(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<JobReport>> {
    let mut file_data: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file_data = Some((file_name, data));
    }

    let (file_name, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    let manager = Arc::clone(&state.manager);
    let report = tokio::task::spawn_blocking(move || manager.create_from_upload(&data, &file_name))
        .await
        .map_err(|e| AppError::InternalError(format!("upload task failed: {e}")))?;

    Ok(Json(report))
}

/// POST /api/v1/jobs/auto/{structure_id}?ignoreHet=
///
/// Create a computation and run the channel tool with default parameters
/// as soon as it is initialized.
pub async fn run_default(
    State(state): State<AppState>,
    Path(structure_id): Path<String>,
    Query(query): Query<AutoQuery>,
) -> Json<JobReport> {
    Json(state.manager.run_default_mole(&structure_id, query.ignore_het))
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/submit/mole
pub async fn submit_mole(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Json<JobReport> {
    let report = match parse_body::<MoleParameters>(&body) {
        Ok(params) => state.manager.submit_mole(&id, params).await,
        Err(e) => {
            tracing::debug!(job_id = %id, error = %e, "Rejected channel parameters");
            JobReport::error(&id, 0, INPUT_FORMAT_ERROR)
        }
    };
    Json(report)
}

/// POST /api/v1/jobs/{id}/submit/pores
pub async fn submit_pores(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Json<JobReport> {
    let report = match parse_body::<PoresRequest>(&body) {
        Ok(request) => state.manager.submit_pores(&id, request).await,
        Err(e) => {
            tracing::debug!(job_id = %id, error = %e, "Rejected pore parameters");
            JobReport::error(&id, 0, INPUT_FORMAT_ERROR)
        }
    };
    Json(report)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}?submitId=
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Json<JobReport> {
    Json(state.manager.status(&id, query.submit_id))
}

/// GET /api/v1/jobs/{id}/info
pub async fn get_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<JobInfo>> {
    Ok(Json(state.manager.job_info(&id)?))
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/kill
pub async fn kill_job(State(state): State<AppState>, Path(id): Path<String>) -> Json<JobReport> {
    Json(state.manager.kill(&id).await)
}

/// DELETE /api/v1/jobs/{id}
///
/// Kills any running process and seals the computation. Files stay on disk.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<JobReport> {
    Json(state.manager.delete(&id).await)
}
