//! Computation entity and its submission state machine.
//!
//! A [`Job`] owns one structure and an append-only list of [`Submission`]s.
//! Every mutation is followed by [`Job::save`], which rewrites
//! `{working_dir}/{job_id}/status.json`; that file is the system of record.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::files::{PREPARATION_DIR, STATUS_FILE};
use crate::persist;
use crate::status::JobStatus;
use crate::types::{JobId, SubmitId, Timestamp};

/// Where the structure of a computation comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureOrigin {
    /// Fetched from the coordinate service by identifier.
    Remote {
        structure_id: String,
        assembly_id: Option<String>,
    },
    /// Uploaded by the caller.
    Upload,
}

/// One attempt to run an external tool within a computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub submit_id: SubmitId,
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: String,
}

impl Submission {
    fn new(submit_id: SubmitId, status: JobStatus) -> Self {
        Self {
            submit_id,
            status,
            error_message: String::new(),
        }
    }
}

/// Status report returned by every lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub job_id: String,
    pub submit_id: SubmitId,
    pub status: JobStatus,
    pub error_message: String,
}

impl JobReport {
    /// Report for an unknown computation id.
    pub fn not_found(job_id: &str) -> Self {
        Self::error(job_id, 0, format!("ComputationId [{job_id}] does not exist."))
    }

    /// Error report that is not tied to a stored submission.
    pub fn error(job_id: &str, submit_id: SubmitId, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.to_string(),
            submit_id,
            status: JobStatus::Error,
            error_message: message.into(),
        }
    }

    /// Replace the message while keeping the rest of the report.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }
}

/// A computation: one structure, many submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: JobId,
    pub working_dir: PathBuf,
    pub is_user_supplied: bool,
    pub structure_id: String,
    pub assembly_id: Option<String>,
    #[serde(default)]
    pub db_mode: bool,
    pub created_at: Timestamp,
    pub submissions: Vec<Submission>,
}

impl Job {
    /// Build a new computation with a single `Initializing` submission.
    pub fn new(working_dir: &Path, origin: StructureOrigin) -> Self {
        let (is_user_supplied, structure_id, assembly_id) = match origin {
            StructureOrigin::Remote {
                structure_id,
                assembly_id,
            } => (false, structure_id, assembly_id),
            StructureOrigin::Upload => (true, String::new(), None),
        };

        Self {
            job_id: JobId::generate(),
            working_dir: working_dir.to_path_buf(),
            is_user_supplied,
            structure_id,
            assembly_id,
            db_mode: false,
            created_at: chrono::Utc::now(),
            submissions: vec![Submission::new(1, JobStatus::Initializing)],
        }
    }

    /// Create the job directory and write the initial status file.
    pub fn create(working_dir: &Path, origin: StructureOrigin) -> Result<Self, CoreError> {
        let job = Self::new(working_dir, origin);
        fs::create_dir_all(job.dir())?;
        job.save()?;
        Ok(job)
    }

    /// Load a computation from disk, `None` if it does not exist.
    pub fn load(working_dir: &Path, job_id: &JobId) -> Result<Option<Self>, CoreError> {
        let path = working_dir.join(job_id.as_str()).join(STATUS_FILE);
        let Some(mut job) = persist::read_json::<Self>(&path)? else {
            return Ok(None);
        };
        if job.submissions.is_empty() {
            return Err(CoreError::Internal(format!(
                "status file of {job_id} has no submissions"
            )));
        }
        job.working_dir = working_dir.to_path_buf();
        Ok(Some(job))
    }

    /// Persist the current state.
    pub fn save(&self) -> Result<(), CoreError> {
        persist::write_json_atomic(&self.status_path(), self)
    }

    pub fn dir(&self) -> PathBuf {
        self.working_dir.join(self.job_id.as_str())
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir().join(STATUS_FILE)
    }

    pub fn submit_dir(&self, submit_id: SubmitId) -> PathBuf {
        self.dir().join(submit_id.to_string())
    }

    /// Working directory of the preparation run.
    pub fn preparation_dir(&self) -> PathBuf {
        self.dir().join(PREPARATION_DIR)
    }

    /// The current (last) submission.
    pub fn current(&self) -> &Submission {
        // Construction always seeds one submission and none are ever removed.
        &self.submissions[self.submissions.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Submission {
        let last = self.submissions.len() - 1;
        &mut self.submissions[last]
    }

    pub fn status(&self) -> JobStatus {
        self.current().status
    }

    pub fn is_deleted(&self) -> bool {
        self.status() == JobStatus::Deleted
    }

    /// Change the status of the current submission.
    ///
    /// Returns `false` without touching anything when the job is sealed as
    /// `Deleted`.
    pub fn set_status(&mut self, status: JobStatus, error_message: impl Into<String>) -> bool {
        if self.is_deleted() {
            return false;
        }
        let current = self.current_mut();
        current.status = status;
        current.error_message = error_message.into();
        true
    }

    /// Make room for a new run and return its submission id.
    ///
    /// A current submission still in `Initialized` has never run and is
    /// reused; otherwise a new one is appended with the next id. The caller
    /// creates the submission directory and persists the job.
    pub fn add_submission(&mut self) -> SubmitId {
        if self.status() != JobStatus::Initialized {
            let next = self.submissions.len() as SubmitId + 1;
            self.submissions
                .push(Submission::new(next, JobStatus::Initialized));
        }
        self.current().submit_id
    }

    pub fn submission(&self, submit_id: SubmitId) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.submit_id == submit_id)
    }

    /// Report for `submit_id`, or for the current submission if `None`.
    pub fn report(&self, submit_id: Option<SubmitId>) -> JobReport {
        let submit_id = submit_id.unwrap_or(self.current().submit_id);
        match self.submission(submit_id) {
            Some(submission) => JobReport {
                job_id: self.job_id.to_string(),
                submit_id: submission.submit_id,
                status: submission.status,
                error_message: submission.error_message.clone(),
            },
            None => JobReport::error(
                self.job_id.as_str(),
                submit_id,
                format!("SubmitId {submit_id} not found."),
            ),
        }
    }

    /// Path of the structure file stored in the job directory.
    ///
    /// This is the only regular file at the job root besides the JSON
    /// documents.
    pub fn structure_file(&self) -> Result<PathBuf, CoreError> {
        for entry in fs::read_dir(self.dir())? {
            let path = entry?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if path.is_file() && !is_json && !is_hidden(&path) {
                return Ok(path);
            }
        }
        Err(CoreError::NotFound {
            entity: "structure",
            id: self.job_id.to_string(),
        })
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
