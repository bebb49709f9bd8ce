use std::sync::Arc;

use mole_core::manager::JobManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Computation lifecycle manager.
    pub manager: Arc<JobManager>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
