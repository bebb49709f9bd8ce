use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default ceiling on concurrently running tool processes.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default number of status polls before a default run gives up waiting
/// for initialization.
pub const DEFAULT_INIT_POLL_ATTEMPTS: u32 = 30;

/// Default pause between those polls.
pub const DEFAULT_INIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings the job manager needs; assembled by the server from its
/// environment.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Root holding one directory per computation and the process registry.
    pub working_dir: PathBuf,
    pub max_concurrent: usize,
    pub mole_executable: PathBuf,
    pub pores_executable: PathBuf,
    /// Passed through to the pore tool.
    pub pymol_path: String,
    /// Passed through to the pore tool.
    pub membed_path: String,
    pub init_poll_attempts: u32,
    pub init_poll_interval: Duration,
}

impl ManagerConfig {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        mole_executable: impl Into<PathBuf>,
        pores_executable: impl Into<PathBuf>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            mole_executable: mole_executable.into(),
            pores_executable: pores_executable.into(),
            pymol_path: String::new(),
            membed_path: String::new(),
            init_poll_attempts: DEFAULT_INIT_POLL_ATTEMPTS,
            init_poll_interval: DEFAULT_INIT_POLL_INTERVAL,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}
