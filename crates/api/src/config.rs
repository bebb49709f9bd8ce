use std::path::PathBuf;
use std::time::Duration;

use mole_core::config::{ManagerConfig, DEFAULT_MAX_CONCURRENT};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Root of all computation directories.
    pub working_directory: PathBuf,
    /// Ceiling on concurrently running tool processes.
    pub max_concurrent_computations: usize,
    pub mole_executable: PathBuf,
    pub pores_executable: PathBuf,
    pub pymol_path: String,
    pub membed_path: String,
    /// Coordinate service serving structures by identifier.
    pub coordinate_server_url: String,
    /// Service serving `{id}-assembly.xml` metadata.
    pub assembly_metadata_url: String,
    /// Timeout for coordinate and metadata downloads, in seconds.
    pub fetch_timeout_secs: u64,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                                           |
    /// |-------------------------------|---------------------------------------------------|
    /// | `HOST`                        | `0.0.0.0`                                         |
    /// | `PORT`                        | `3000`                                            |
    /// | `CORS_ORIGINS`                | `http://localhost:5173`                           |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                                              |
    /// | `WORKING_DIRECTORY`           | `./computations`                                  |
    /// | `MAX_CONCURRENT_COMPUTATIONS` | `10`                                              |
    /// | `MOLE_EXECUTABLE`             | `./bin/mole`                                      |
    /// | `PORES_EXECUTABLE`            | `./bin/pores`                                     |
    /// | `PYMOL_PATH`                  | `pymol`                                           |
    /// | `MEMBED_PATH`                 | `membed`                                          |
    /// | `COORDINATE_SERVER_URL`       | `https://coords.litemol.org`                      |
    /// | `ASSEMBLY_METADATA_URL`       | `http://www.ebi.ac.uk/pdbe/static/entry/download` |
    /// | `FETCH_TIMEOUT_SECS`          | `60`                                              |
    /// | `MAX_UPLOAD_BYTES`            | `104857600`                                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let working_directory = PathBuf::from(
            std::env::var("WORKING_DIRECTORY").unwrap_or_else(|_| "./computations".into()),
        );

        let max_concurrent_computations: usize = std::env::var("MAX_CONCURRENT_COMPUTATIONS")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT.to_string())
            .parse()
            .expect("MAX_CONCURRENT_COMPUTATIONS must be a valid usize");

        let mole_executable = PathBuf::from(
            std::env::var("MOLE_EXECUTABLE").unwrap_or_else(|_| "./bin/mole".into()),
        );
        let pores_executable = PathBuf::from(
            std::env::var("PORES_EXECUTABLE").unwrap_or_else(|_| "./bin/pores".into()),
        );

        let pymol_path = std::env::var("PYMOL_PATH").unwrap_or_else(|_| "pymol".into());
        let membed_path = std::env::var("MEMBED_PATH").unwrap_or_else(|_| "membed".into());

        let coordinate_server_url = std::env::var("COORDINATE_SERVER_URL")
            .unwrap_or_else(|_| "https://coords.litemol.org".into());
        let assembly_metadata_url = std::env::var("ASSEMBLY_METADATA_URL")
            .unwrap_or_else(|_| "http://www.ebi.ac.uk/pdbe/static/entry/download".into());

        let fetch_timeout_secs: u64 = std::env::var("FETCH_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("FETCH_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "104857600".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            working_directory,
            max_concurrent_computations,
            mole_executable,
            pores_executable,
            pymol_path,
            membed_path,
            coordinate_server_url,
            assembly_metadata_url,
            fetch_timeout_secs,
            max_upload_bytes,
        }
    }

    /// The subset handed to the job manager.
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::new(
            &self.working_directory,
            &self.mole_executable,
            &self.pores_executable,
        );
        config.max_concurrent = self.max_concurrent_computations;
        config.pymol_path = self.pymol_path.clone();
        config.membed_path = self.membed_path.clone();
        config
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
