//! Read-only views over one computation and over the whole workspace.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;
use crate::files::{MOLE_PARAMS, PORES_PARAMS};
use crate::job::Job;
use crate::params::{PoresInput, PoresUserParameters};
use crate::persist;
use crate::status::JobStatus;
use crate::types::{SubmitId, Timestamp};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub job_id: String,
    pub is_user_supplied: bool,
    pub structure_id: String,
    pub assembly_id: Option<String>,
    pub db_mode: bool,
    pub created_at: Timestamp,
    pub submissions: Vec<SubmissionInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInfo {
    pub submit_id: SubmitId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    /// Channel tool parameters exactly as submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mole_config: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pores_config: Option<PoresUserParameters>,
}

/// Describe `job` together with the parameters stored for each submission.
pub fn job_info(job: &Job) -> Result<JobInfo, CoreError> {
    let submissions = job
        .submissions
        .iter()
        .map(|s| {
            let dir = job.submit_dir(s.submit_id);
            let mole_config = persist::read_json::<serde_json::Value>(&dir.join(MOLE_PARAMS))?;
            let pores_config = persist::read_json::<PoresInput>(&dir.join(PORES_PARAMS))?
                .map(|input| input.user_parameters());
            Ok(SubmissionInfo {
                submit_id: s.submit_id,
                status: s.status,
                error_message: s.error_message.clone(),
                mole_config,
                pores_config,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    Ok(JobInfo {
        job_id: job.job_id.to_string(),
        is_user_supplied: job.is_user_supplied,
        structure_id: job.structure_id.clone(),
        assembly_id: job.assembly_id.clone(),
        db_mode: job.db_mode,
        created_at: job.created_at,
        submissions,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub sessions: usize,
    pub sessions_without_computation: usize,
    pub computations: ComputationCounts,
    pub popular_structures: Vec<StructureCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationCounts {
    pub mole: usize,
    pub pores: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureCount {
    pub structure: String,
    pub count: usize,
}

/// Scan every computation directory under `working_dir`.
///
/// A session is a computation directory; it has a computation once its first
/// submission directory exists. Structures are ranked by how many sessions
/// use them, ties broken by name.
pub fn workspace_summary(working_dir: &Path) -> Result<WorkspaceSummary, CoreError> {
    let mut summary = WorkspaceSummary::default();
    let mut popularity: HashMap<String, usize> = HashMap::new();

    for entry in fs::read_dir(working_dir)? {
        let session = entry?.path();
        if !session.is_dir() {
            continue;
        }
        summary.sessions += 1;
        if !session.join("1").is_dir() {
            summary.sessions_without_computation += 1;
        }

        for sub in fs::read_dir(&session)? {
            let sub = sub?.path();
            if !sub.is_dir() {
                continue;
            }
            if sub.join(MOLE_PARAMS).is_file() {
                summary.computations.mole += 1;
            }
            if sub.join(PORES_PARAMS).is_file() {
                summary.computations.pores += 1;
            }
        }

        if let Some(structure) = structure_name(&session)? {
            *popularity.entry(structure).or_default() += 1;
        }
    }

    let mut ranked: Vec<StructureCount> = popularity
        .into_iter()
        .map(|(structure, count)| StructureCount { structure, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.structure.cmp(&b.structure)));
    summary.popular_structures = ranked;

    Ok(summary)
}

/// Stem of the structure file stored in a session directory.
fn structure_name(session: &Path) -> Result<Option<String>, CoreError> {
    let mut files: Vec<_> = fs::read_dir(session)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| !p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with('.'))
        })
        .collect();
    files.sort();

    Ok(files
        .first()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned()))
}
