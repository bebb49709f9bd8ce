//! Computation lifecycle orchestrator.
//!
//! Creates computations, admits and launches submissions, applies tool
//! outcomes, and serves status, kill, delete and artifact requests. Held by
//! the server as an `Arc<JobManager>`; long-running work (downloads, tool
//! runs) happens in spawned tasks that own a clone of that `Arc`.
//!
//! The per-job status file is the system of record. Writers for one job are
//! serialized through a per-job async mutex (load, mutate, atomic save);
//! readers deserialize the file without locking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex as AsyncMutex;

use crate::admission::AdmissionController;
use crate::archive;
use crate::artifact::{Artifact, ArtifactKind};
use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::fetch::{self, StructureSource};
use crate::files::{MOLE_INPUT, MOLE_PARAMS, PORES_PARAMS};
use crate::input::{self, MoleLayout, PoresStructure, PoresTools};
use crate::job::{Job, JobReport, StructureOrigin};
use crate::params::{MoleParameters, PoresRequest};
use crate::persist;
use crate::registry::ProcessRegistry;
use crate::status::JobStatus;
use crate::summary::{self, JobInfo, WorkspaceSummary};
use crate::supervisor::{self, ToolOutcome};
use crate::types::{JobId, SubmitId};

/// Accepted upload names: `.pdb`, `.cif`, `.gz` and numbered `.pdbN`.
static UPLOAD_EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\.pdb|\.cif|\.gz|\.pdb[0-9]+)$").expect("valid regex")
});

const UNSUPPORTED_UPLOAD: &str =
    "Unsupported file type. Supported extensions are *.pdb, *.cif, *.pdbX (e.g. *.pdb1) and *.gz";

const TERMINATION_FAILED: &str = "Something went wrong during the process termination.";

const INTERRUPTED_BY_RESTART: &str = "Computation was interrupted by a server restart.";

const ORPHAN_LOST: &str =
    "Computation finished while the server was restarting and produced no results.";

const INIT_TIMED_OUT: &str = "Structure preparation did not finish in time.";

/// How often an adopted process from a previous server run is checked.
const ORPHAN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Longest accepted structure or assembly identifier.
const MAX_STRUCTURE_ID_LEN: usize = 32;

/// Job-lock map size above which idle locks are dropped.
const LOCK_MAP_PRUNE_THRESHOLD: usize = 1024;

/// The external tools a submission can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Mole,
    Pores,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mole => "mole",
            Self::Pores => "pores",
        }
    }
}

/// Parameters of one submission, per tool.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    Mole(MoleParameters),
    Pores(PoresRequest),
}

impl ToolRequest {
    pub fn tool(&self) -> Tool {
        match self {
            Self::Mole(_) => Tool::Mole,
            Self::Pores(_) => Tool::Pores,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::Mole(params) => params.validate(),
            Self::Pores(request) => request.validate(),
        }
    }
}

/// How a structure is obtained from the coordinate service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// The requested structure or assembly, as asked.
    AsRequested,
    /// The preferred biological assembly, for pore tool database mode.
    PreferredAssembly,
}

pub struct JobManager {
    config: ManagerConfig,
    registry: ProcessRegistry,
    admission: AdmissionController,
    source: Arc<dyn StructureSource>,
    job_locks: std::sync::Mutex<HashMap<JobId, Arc<AsyncMutex<()>>>>,
}

impl JobManager {
    /// Prepare the working directory and load the process registry.
    pub fn new(
        config: ManagerConfig,
        source: Arc<dyn StructureSource>,
    ) -> Result<Arc<Self>, CoreError> {
        std::fs::create_dir_all(&config.working_dir)?;
        let registry = ProcessRegistry::load(&config.working_dir)?;
        let admission = AdmissionController::new(config.max_concurrent);

        tracing::info!(
            working_dir = %config.working_dir.display(),
            max_concurrent = config.max_concurrent,
            "Job manager ready"
        );

        Ok(Arc::new(Self {
            config,
            registry,
            admission,
            source,
            job_locks: std::sync::Mutex::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    fn working_dir(&self) -> &Path {
        &self.config.working_dir
    }

    // ---- locking and persistence helpers ----

    fn job_lock(&self, job_id: &JobId) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .job_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.len() > LOCK_MAP_PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(job_id.clone()).or_default().clone()
    }

    fn load(&self, job_id: &JobId) -> Result<Option<Job>, CoreError> {
        Job::load(self.working_dir(), job_id)
    }

    /// Load, mutate and save a job under its lock.
    ///
    /// `mutate` returns whether anything changed; unchanged jobs are not
    /// rewritten. Returns `None` if the job does not exist.
    async fn update_job<F>(&self, job_id: &JobId, mutate: F) -> Result<Option<Job>, CoreError>
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let lock = self.job_lock(job_id);
        let _guard = lock.lock().await;

        let Some(mut job) = self.load(job_id)? else {
            return Ok(None);
        };
        if mutate(&mut job) {
            job.save()?;
        }
        Ok(Some(job))
    }

    /// Best-effort status change for background tasks, which have nobody to
    /// report an error to.
    async fn set_status_logged(&self, job_id: &JobId, status: JobStatus, message: &str) {
        let result = self
            .update_job(job_id, |job| job.set_status(status, message))
            .await;
        if let Err(e) = result {
            tracing::error!(job_id = %job_id, %status, error = %e, "Failed to persist status change");
        }
    }

    // ---- creation ----

    /// Create a computation for a remote structure and initialize it in the
    /// background.
    pub fn create_from_identifier(
        self: &Arc<Self>,
        structure_id: &str,
        assembly_id: Option<&str>,
    ) -> JobReport {
        self.create_remote(structure_id, assembly_id, FetchMode::AsRequested)
    }

    /// Create a computation for the pore tool.
    ///
    /// The preferred biological assembly is downloaded instead of the full
    /// structure and database mode is enabled; without a declared preferred
    /// assembly the full structure is used.
    pub fn create_pores_from_identifier(self: &Arc<Self>, structure_id: &str) -> JobReport {
        self.create_remote(structure_id, None, FetchMode::PreferredAssembly)
    }

    fn create_remote(
        self: &Arc<Self>,
        structure_id: &str,
        assembly_id: Option<&str>,
        mode: FetchMode,
    ) -> JobReport {
        if let Err(e) = validate_identifier("structure", structure_id)
            .and_then(|()| assembly_id.map_or(Ok(()), |a| validate_identifier("assembly", a)))
        {
            return JobReport::error("", 0, e.user_message());
        }

        let origin = StructureOrigin::Remote {
            structure_id: structure_id.to_string(),
            assembly_id: assembly_id.map(str::to_string),
        };
        let job = match Job::create(self.working_dir(), origin) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(structure_id, error = %e, "Failed to create computation");
                return JobReport::error("", 0, e.user_message());
            }
        };

        tracing::info!(job_id = %job.job_id, structure_id, ?assembly_id, "Computation created");

        let manager = Arc::clone(self);
        let job_id = job.job_id.clone();
        tokio::spawn(async move { manager.initialize_remote(job_id, mode).await });

        job.report(None)
    }

    async fn initialize_remote(self: Arc<Self>, job_id: JobId, mode: FetchMode) {
        if let Err(e) = self.download_and_prepare(&job_id, mode).await {
            tracing::warn!(job_id = %job_id, error = %e, "Computation initialization failed");
            self.set_status_logged(&job_id, JobStatus::FailedInitialization, &e.user_message())
                .await;
        }
    }

    async fn download_and_prepare(&self, job_id: &JobId, mode: FetchMode) -> Result<(), CoreError> {
        let job = self
            .load(job_id)?
            .ok_or_else(|| CoreError::job_not_found(job_id.as_str()))?;
        let structure_id = job.structure_id.clone();

        // 1. Resolve which assembly to download.
        let preferred = self.preferred_assembly(&structure_id).await;
        let (assembly_id, db_mode) = match mode {
            FetchMode::PreferredAssembly => (preferred.clone(), preferred.is_some()),
            FetchMode::AsRequested => {
                let db_mode = preferred.is_some() && preferred == job.assembly_id;
                (job.assembly_id.clone(), db_mode)
            }
        };

        // 2. Download and validate the structure.
        let bytes = self
            .source
            .fetch_structure(&structure_id, assembly_id.as_deref())
            .await?;
        fetch::validate_structure(&bytes)?;

        let path = job.dir().join(format!("{structure_id}.cif"));
        persist::write_bytes_atomic(&path, &bytes)?;
        tracing::debug!(job_id = %job_id, bytes = bytes.len(), "Structure stored");

        // 3. Record the resolved assembly.
        let updated = self
            .update_job(job_id, |job| {
                job.assembly_id = assembly_id;
                job.db_mode = db_mode;
                true
            })
            .await?
            .ok_or_else(|| CoreError::job_not_found(job_id.as_str()))?;

        // 4. Normalize the structure with a preparation run.
        self.run_preparation(&updated, &path).await
    }

    /// Preferred assembly from the metadata service; failures only log.
    async fn preferred_assembly(&self, structure_id: &str) -> Option<String> {
        match self.source.preferred_assembly(structure_id).await {
            Ok(assembly) => assembly,
            Err(e) => {
                tracing::warn!(structure_id, error = %e, "Assembly metadata unavailable");
                None
            }
        }
    }

    /// Run the channel tool once in `{job}/0` so structure errors surface
    /// before any submission. Does not take an admission slot.
    async fn run_preparation(&self, job: &Job, structure: &Path) -> Result<(), CoreError> {
        let dir = job.preparation_dir();
        std::fs::create_dir_all(&dir)?;
        let input_path = dir.join(MOLE_INPUT);
        let document = input::preparation_input(structure, &dir).to_document();
        persist::write_bytes_atomic(&input_path, document.as_bytes())?;

        let process = supervisor::spawn_tool(&self.config.mole_executable, &input_path).await?;
        let pid = process.pid();
        if let Err(e) = self.registry.register(&job.job_id, pid) {
            tracing::error!(job_id = %job.job_id, pid, error = %e, "Failed to persist process registry");
        }
        tracing::info!(job_id = %job.job_id, pid, "Preparation run started");

        let outcome = process.wait().await;
        self.deregister(&job.job_id, pid);

        match outcome? {
            ToolOutcome::Succeeded => {
                self.update_job(&job.job_id, |job| {
                    job.status() == JobStatus::Initializing
                        && job.set_status(JobStatus::Initialized, "")
                })
                .await?;
                tracing::info!(job_id = %job.job_id, "Computation initialized");
            }
            ToolOutcome::Failed(diagnostics) => {
                tracing::warn!(job_id = %job.job_id, "Preparation run reported errors");
                self.update_job(&job.job_id, |job| {
                    job.status() == JobStatus::Initializing
                        && job.set_status(JobStatus::FailedInitialization, diagnostics)
                })
                .await?;
            }
            ToolOutcome::Killed => {
                tracing::info!(job_id = %job.job_id, "Preparation run was killed");
            }
        }
        Ok(())
    }

    /// Create a computation from an uploaded structure file.
    pub fn create_from_upload(&self, bytes: &[u8], file_name: &str) -> JobReport {
        let name = file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();
        if name.starts_with('.') || !UPLOAD_EXTENSION_RE.is_match(name) {
            return JobReport::error("", 0, UNSUPPORTED_UPLOAD);
        }

        let mut job = match Job::create(self.working_dir(), StructureOrigin::Upload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(file_name = name, error = %e, "Failed to create computation");
                return JobReport::error("", 0, e.user_message());
            }
        };

        let stored = persist::write_bytes_atomic(&job.dir().join(name), bytes);
        let (status, message) = match &stored {
            Ok(()) => (JobStatus::Initialized, String::new()),
            Err(e) => (JobStatus::FailedInitialization, e.user_message()),
        };
        job.set_status(status, message);
        if let Err(e) = job.save() {
            tracing::error!(job_id = %job.job_id, error = %e, "Failed to persist upload status");
            return JobReport::error(job.job_id.as_str(), 0, e.user_message());
        }

        tracing::info!(job_id = %job.job_id, file_name = name, bytes = bytes.len(), %status, "Structure uploaded");
        job.report(None)
    }

    // ---- submission ----

    pub async fn submit_mole(self: &Arc<Self>, job_id: &str, params: MoleParameters) -> JobReport {
        self.submit(job_id, ToolRequest::Mole(params)).await
    }

    pub async fn submit_pores(self: &Arc<Self>, job_id: &str, request: PoresRequest) -> JobReport {
        self.submit(job_id, ToolRequest::Pores(request)).await
    }

    /// Admit and launch a submission. Returns as soon as the tool is
    /// scheduled; callers poll [`JobManager::status`] for completion.
    pub async fn submit(self: &Arc<Self>, raw_id: &str, request: ToolRequest) -> JobReport {
        let Some(job_id) = JobId::parse(raw_id) else {
            return JobReport::not_found(raw_id);
        };
        let tool = request.tool();

        let lock = self.job_lock(&job_id);
        let _guard = lock.lock().await;

        // 1. Load the computation.
        let mut job = match self.load(&job_id) {
            Ok(Some(job)) => job,
            Ok(None) => return JobReport::not_found(raw_id),
            Err(e) => return JobReport::error(raw_id, 0, e.user_message()),
        };

        // 2. Reject invalid parameters before touching anything.
        if let Err(e) = request.validate() {
            return JobReport::error(raw_id, 0, e.user_message());
        }

        // 3. Admission: status check plus slot reservation.
        if let Err(rejection) = self.admission.admit(&job_id, job.status(), &self.registry) {
            tracing::info!(job_id = %job_id, tool = tool.as_str(), %rejection, "Submission rejected");
            return JobReport::error(raw_id, 0, rejection.to_string());
        }

        // 4. Open the submission and mark it running.
        let submit_id = job.add_submission();
        let opened = std::fs::create_dir_all(job.submit_dir(submit_id))
            .map_err(CoreError::from)
            .and_then(|()| {
                job.set_status(JobStatus::Running, "");
                job.save()
            });
        if let Err(e) = opened {
            self.registry.release(&job_id);
            tracing::error!(job_id = %job_id, submit_id, error = %e, "Failed to open submission");
            return JobReport::error(raw_id, submit_id, e.user_message());
        }

        // 5. Persist the parameters and build the tool input.
        let input_path = match self.write_submission_input(&job, submit_id, &request) {
            Ok(path) => path,
            Err(e) => {
                self.registry.release(&job_id);
                tracing::warn!(job_id = %job_id, submit_id, error = %e, "Failed to prepare tool input");
                job.set_status(JobStatus::Error, e.user_message());
                if let Err(e) = job.save() {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to persist status change");
                }
                return job.report(None);
            }
        };

        // 6. Launch in the background; the reservation moves to the task.
        tracing::info!(job_id = %job_id, submit_id, tool = tool.as_str(), "Submission started");
        let manager = Arc::clone(self);
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            manager
                .run_submission(task_job_id, submit_id, tool, input_path)
                .await
        });

        job.report(None)
    }

    fn write_submission_input(
        &self,
        job: &Job,
        submit_id: SubmitId,
        request: &ToolRequest,
    ) -> Result<PathBuf, CoreError> {
        let dir = job.submit_dir(submit_id);
        match request {
            ToolRequest::Mole(params) => {
                let structure = job.structure_file()?;
                persist::write_json_atomic(&dir.join(MOLE_PARAMS), params)?;

                let layout = MoleLayout {
                    structure: &structure,
                    working_directory: &dir,
                };
                let document = input::mole_input(&layout, params).to_document();
                let path = dir.join(MOLE_INPUT);
                persist::write_bytes_atomic(&path, document.as_bytes())?;
                Ok(path)
            }
            ToolRequest::Pores(request) => {
                let structure_file;
                let structure = if job.db_mode {
                    PoresStructure::Database {
                        structure_id: &job.structure_id,
                    }
                } else {
                    structure_file = job.structure_file()?;
                    PoresStructure::File(&structure_file)
                };
                let tools = PoresTools {
                    pymol: &self.config.pymol_path,
                    membed: &self.config.membed_path,
                };

                let pores = input::pores_input(request, structure, &dir, &tools);
                let path = dir.join(PORES_PARAMS);
                persist::write_json_atomic(&path, &pores)?;
                Ok(path)
            }
        }
    }

    async fn run_submission(
        self: Arc<Self>,
        job_id: JobId,
        submit_id: SubmitId,
        tool: Tool,
        input_path: PathBuf,
    ) {
        let executable = match tool {
            Tool::Mole => &self.config.mole_executable,
            Tool::Pores => &self.config.pores_executable,
        };

        let process = match supervisor::spawn_tool(executable, &input_path).await {
            Ok(process) => process,
            Err(e) => {
                self.registry.release(&job_id);
                tracing::error!(job_id = %job_id, submit_id, error = %e, "Failed to launch tool");
                self.apply_outcome(&job_id, submit_id, Err(e)).await;
                return;
            }
        };

        let pid = process.pid();
        if let Err(e) = self.registry.register(&job_id, pid) {
            tracing::error!(job_id = %job_id, pid, error = %e, "Failed to persist process registry");
        }
        tracing::debug!(job_id = %job_id, submit_id, pid, "Tool process registered");

        let outcome = process.wait().await;
        self.deregister(&job_id, pid);
        self.apply_outcome(&job_id, submit_id, outcome).await;
    }

    fn deregister(&self, job_id: &JobId, pid: u32) {
        if let Err(e) = self.registry.remove_pid(job_id, pid) {
            tracing::error!(job_id = %job_id, pid, error = %e, "Failed to persist process registry");
        }
    }

    /// Apply a finished run to its submission.
    ///
    /// Only a submission that is still current and `Running` is touched, so
    /// an outcome observed after a kill or delete changes nothing.
    async fn apply_outcome(
        &self,
        job_id: &JobId,
        submit_id: SubmitId,
        outcome: Result<ToolOutcome, CoreError>,
    ) {
        let (status, message) = match outcome {
            Ok(ToolOutcome::Killed) => {
                tracing::info!(job_id = %job_id, submit_id, "Tool process was killed");
                return;
            }
            Ok(ToolOutcome::Failed(diagnostics)) => (JobStatus::Error, diagnostics),
            Ok(ToolOutcome::Succeeded) => match self.package_report(job_id, submit_id).await {
                Ok(()) => (JobStatus::Finished, String::new()),
                Err(e) => (JobStatus::Error, e.user_message()),
            },
            Err(e) => (JobStatus::Error, e.user_message()),
        };

        let result = self
            .update_job(job_id, |job| {
                let current = job.current();
                if current.submit_id != submit_id || current.status != JobStatus::Running {
                    return false;
                }
                job.set_status(status, message)
            })
            .await;

        match result {
            Ok(_) => tracing::info!(job_id = %job_id, submit_id, %status, "Submission completed"),
            Err(e) => {
                tracing::error!(job_id = %job_id, submit_id, error = %e, "Failed to persist outcome")
            }
        }
    }

    async fn package_report(&self, job_id: &JobId, submit_id: SubmitId) -> Result<(), CoreError> {
        let dir = self
            .working_dir()
            .join(job_id.as_str())
            .join(submit_id.to_string());
        tokio::task::spawn_blocking(move || archive::write_report(&dir))
            .await
            .map_err(|e| CoreError::Internal(format!("archive task failed: {e}")))?
    }

    /// Create a computation and run the channel tool with default
    /// parameters once it is initialized.
    ///
    /// Initialization is awaited by polling the status for a bounded number
    /// of attempts; running out marks the computation `FailedInitialization`.
    pub fn run_default_mole(self: &Arc<Self>, structure_id: &str, ignore_het: bool) -> JobReport {
        let report = self.create_from_identifier(structure_id, None);
        if report.status != JobStatus::Initializing {
            return report;
        }
        let Some(job_id) = JobId::parse(&report.job_id) else {
            return report;
        };

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager
                .submit_when_initialized(job_id, MoleParameters::with_ignore_het(ignore_het))
                .await
        });
        report
    }

    async fn submit_when_initialized(self: Arc<Self>, job_id: JobId, params: MoleParameters) {
        for _ in 0..self.config.init_poll_attempts {
            tokio::time::sleep(self.config.init_poll_interval).await;

            let status = match self.load(&job_id) {
                Ok(Some(job)) => job.status(),
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Failed to read computation status");
                    continue;
                }
            };

            match status {
                JobStatus::Initializing => continue,
                JobStatus::Initialized => {
                    let report = self.submit(job_id.as_str(), ToolRequest::Mole(params)).await;
                    if report.status == JobStatus::Error {
                        tracing::warn!(job_id = %job_id, reason = %report.error_message, "Default run was not started");
                    }
                    return;
                }
                other => {
                    tracing::info!(job_id = %job_id, status = %other, "Default run skipped");
                    return;
                }
            }
        }

        tracing::warn!(job_id = %job_id, "Initialization wait exhausted");
        let result = self
            .update_job(&job_id, |job| {
                job.status() == JobStatus::Initializing
                    && job.set_status(JobStatus::FailedInitialization, INIT_TIMED_OUT)
            })
            .await;
        if let Err(e) = result {
            tracing::error!(job_id = %job_id, error = %e, "Failed to persist status change");
        }
    }

    // ---- queries ----

    /// Report for `submit_id`, or for the latest submission.
    pub fn status(&self, raw_id: &str, submit_id: Option<SubmitId>) -> JobReport {
        let Some(job_id) = JobId::parse(raw_id) else {
            return JobReport::not_found(raw_id);
        };
        match self.load(&job_id) {
            Ok(Some(job)) => job.report(submit_id),
            Ok(None) => JobReport::not_found(raw_id),
            Err(e) => JobReport::error(raw_id, 0, e.user_message()),
        }
    }

    pub fn job_info(&self, raw_id: &str) -> Result<JobInfo, CoreError> {
        let job = self.require(raw_id)?;
        summary::job_info(&job)
    }

    pub async fn summary(&self) -> Result<WorkspaceSummary, CoreError> {
        let dir = self.working_dir().to_path_buf();
        tokio::task::spawn_blocking(move || summary::workspace_summary(&dir))
            .await
            .map_err(|e| CoreError::Internal(format!("summary task failed: {e}")))?
    }

    fn require(&self, raw_id: &str) -> Result<Job, CoreError> {
        let job_id = JobId::parse(raw_id).ok_or_else(|| CoreError::job_not_found(raw_id))?;
        self.load(&job_id)?
            .ok_or_else(|| CoreError::job_not_found(raw_id))
    }

    /// Resolve a downloadable output of a submission.
    pub async fn query_artifact(
        &self,
        raw_id: &str,
        submit_id: Option<SubmitId>,
        kind: ArtifactKind,
    ) -> Result<Artifact, CoreError> {
        let job = self.require(raw_id)?;
        if job.is_deleted() {
            return Err(CoreError::Gone(raw_id.to_string()));
        }

        let submit_id = submit_id.unwrap_or(job.current().submit_id);
        if job.submission(submit_id).is_none() {
            return Err(CoreError::NotFound {
                entity: "submission",
                id: format!("{raw_id}/{submit_id}"),
            });
        }

        let (bytes, file_name) = match kind {
            ArtifactKind::Molecule => {
                let path = job.structure_file()?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (read_artifact(&path, kind).await?, name)
            }
            ArtifactKind::Membrane => {
                let path = job.dir().join(artifact_location(kind)?);
                (
                    read_artifact(&path, kind).await?,
                    kind.download_name(&job.job_id, submit_id),
                )
            }
            ArtifactKind::Pdb => {
                let dir = job.submit_dir(submit_id).join(artifact_location(kind)?);
                let bytes = tokio::task::spawn_blocking(move || archive::zip_directory(&dir))
                    .await
                    .map_err(|e| CoreError::Internal(format!("archive task failed: {e}")))?
                    .map_err(|e| match e {
                        CoreError::NotFound { .. } => artifact_missing(kind),
                        other => other,
                    })?;
                (bytes, kind.download_name(&job.job_id, submit_id))
            }
            _ => {
                let path = job.submit_dir(submit_id).join(artifact_location(kind)?);
                (
                    read_artifact(&path, kind).await?,
                    kind.download_name(&job.job_id, submit_id),
                )
            }
        };

        Ok(Artifact {
            bytes,
            file_name,
            content_type: kind.content_type(),
        })
    }

    // ---- termination ----

    /// Terminate the running process of a computation.
    pub async fn kill(&self, raw_id: &str) -> JobReport {
        let Some(job_id) = JobId::parse(raw_id) else {
            return JobReport::not_found(raw_id);
        };
        let lock = self.job_lock(&job_id);
        let _guard = lock.lock().await;

        match self.load(&job_id) {
            Ok(Some(mut job)) => self.kill_locked(&mut job),
            Ok(None) => JobReport::not_found(raw_id),
            Err(e) => JobReport::error(raw_id, 0, e.user_message()),
        }
    }

    /// Kill with the job lock held.
    fn kill_locked(&self, job: &mut Job) -> JobReport {
        let Some(pid) = self.registry.pid_of(&job.job_id) else {
            let report = job.report(None);
            let message = format!("Cannot kill computation with the status \"{}\"", report.status);
            return report.with_message(message);
        };

        match supervisor::terminate(pid) {
            Ok(termination) => {
                tracing::info!(job_id = %job.job_id, pid, ?termination, "Computation killed");
                if let Err(e) = self.registry.remove(&job.job_id) {
                    tracing::error!(job_id = %job.job_id, error = %e, "Failed to persist process registry");
                }
                if job.set_status(JobStatus::Aborted, "") {
                    if let Err(e) = job.save() {
                        tracing::error!(job_id = %job.job_id, error = %e, "Failed to persist status change");
                    }
                }
                job.report(None)
            }
            Err(e) => {
                tracing::error!(job_id = %job.job_id, pid, error = %e, "Process termination failed");
                job.report(None).with_message(TERMINATION_FAILED)
            }
        }
    }

    /// Kill any running process and seal the computation as `Deleted`.
    ///
    /// Nothing is removed from disk.
    pub async fn delete(&self, raw_id: &str) -> JobReport {
        let Some(job_id) = JobId::parse(raw_id) else {
            return JobReport::not_found(raw_id);
        };
        let lock = self.job_lock(&job_id);
        let _guard = lock.lock().await;

        let mut job = match self.load(&job_id) {
            Ok(Some(job)) => job,
            Ok(None) => return JobReport::not_found(raw_id),
            Err(e) => return JobReport::error(raw_id, 0, e.user_message()),
        };

        self.kill_locked(&mut job);
        if job.set_status(JobStatus::Deleted, "") {
            if let Err(e) = job.save() {
                tracing::error!(job_id = %job_id, error = %e, "Failed to persist deletion");
                return JobReport::error(raw_id, job.current().submit_id, e.user_message());
            }
        }

        tracing::info!(job_id = %job_id, "Computation deleted");
        let mut report = job.report(None);
        report.status = JobStatus::Deleted;
        report
    }

    // ---- startup recovery ----

    /// Reconcile the registry loaded from disk with the live process table.
    ///
    /// Entries whose process is gone are removed and their computation is
    /// marked failed. Live processes are adopted: they stay killable and are
    /// watched until they exit. Returns the number of pruned entries.
    pub async fn prune_stale_processes(self: &Arc<Self>) -> usize {
        let mut pruned = 0;

        for (job_id, pid) in self.registry.snapshot() {
            if supervisor::is_alive(pid) {
                tracing::info!(job_id = %job_id, pid, "Adopting process from a previous run");
                let manager = Arc::clone(self);
                tokio::spawn(async move { manager.watch_orphan(job_id, pid).await });
                continue;
            }

            self.deregister(&job_id, pid);
            self.mark_interrupted(&job_id, INTERRUPTED_BY_RESTART).await;
            pruned += 1;
        }

        if pruned > 0 {
            tracing::info!(pruned, "Pruned stale process registry entries");
        }
        pruned
    }

    async fn mark_interrupted(&self, job_id: &JobId, message: &str) {
        let result = self
            .update_job(job_id, |job| match job.status() {
                JobStatus::Running => job.set_status(JobStatus::Error, message),
                JobStatus::Initializing => job.set_status(JobStatus::FailedInitialization, message),
                _ => false,
            })
            .await;
        if let Err(e) = result {
            tracing::error!(job_id = %job_id, error = %e, "Failed to persist status change");
        }
    }

    /// Wait for a process this server did not spawn and settle its job.
    ///
    /// The error stream of such a process is lost, so a run counts as
    /// finished when its channel data exists.
    async fn watch_orphan(self: Arc<Self>, job_id: JobId, pid: u32) {
        while supervisor::is_alive(pid) {
            tokio::time::sleep(ORPHAN_POLL_INTERVAL).await;
        }

        match self.registry.remove_pid(&job_id, pid) {
            Ok(true) => {}
            // Killed or replaced in the meantime.
            Ok(false) => return,
            Err(e) => {
                tracing::error!(job_id = %job_id, pid, error = %e, "Failed to persist process registry");
            }
        }

        let current = match self.load(&job_id) {
            Ok(Some(job)) => job.current().clone(),
            _ => return,
        };
        let data = self
            .working_dir()
            .join(job_id.as_str())
            .join(current.submit_id.to_string())
            .join(ArtifactKind::Json.relative_path().unwrap_or_default());

        if current.status == JobStatus::Running && data.is_file() {
            self.apply_outcome(&job_id, current.submit_id, Ok(ToolOutcome::Succeeded))
                .await;
        } else {
            self.mark_interrupted(&job_id, ORPHAN_LOST).await;
        }
    }
}

fn artifact_location(kind: ArtifactKind) -> Result<PathBuf, CoreError> {
    kind.relative_path()
        .ok_or_else(|| CoreError::Internal(format!("artifact {kind} has no fixed location")))
}

async fn read_artifact(path: &Path, kind: ArtifactKind) -> Result<Vec<u8>, CoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(artifact_missing(kind)),
        Err(e) => Err(e.into()),
    }
}

fn artifact_missing(kind: ArtifactKind) -> CoreError {
    CoreError::NotFound {
        entity: "artifact",
        id: kind.to_string(),
    }
}

fn validate_identifier(what: &str, id: &str) -> Result<(), CoreError> {
    if id.is_empty()
        || id.len() > MAX_STRUCTURE_ID_LEN
        || !id.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(CoreError::Validation(format!(
            "Invalid {what} identifier '{id}'."
        )));
    }
    Ok(())
}
