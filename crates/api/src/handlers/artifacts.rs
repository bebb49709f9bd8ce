//! Artifact downloads for finished submissions.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use mole_core::artifact::ArtifactKind;
use serde::Deserialize;

use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub submit_id: Option<u32>,
    /// One of `json`, `report`, `molecule`, `pymol`, `chimera`, `vmd`,
    /// `pdb`, `membrane`; defaults to `json`.
    pub format: Option<String>,
}

/// GET /api/v1/jobs/{id}/data?submitId=&format=
///
/// Returns 404 for an unknown computation, submission or missing file and
/// 410 once the computation has been deleted.
pub async fn get_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DataQuery>,
) -> AppResult<impl IntoResponse> {
    let kind = query
        .format
        .as_deref()
        .map(str::parse::<ArtifactKind>)
        .transpose()?
        .unwrap_or_default();

    let artifact = state
        .manager
        .query_artifact(&id, query.submit_id, kind)
        .await?;

    tracing::debug!(job_id = %id, %kind, bytes = artifact.bytes.len(), "Serving artifact");

    let headers = [
        (CONTENT_TYPE, artifact.content_type.to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.file_name),
        ),
    ];
    Ok((headers, artifact.bytes))
}
