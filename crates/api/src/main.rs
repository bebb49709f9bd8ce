use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mole_api::config::ServerConfig;
use mole_api::router::build_app_router;
use mole_api::state::AppState;
use mole_core::fetch::RemoteStructureSource;
use mole_core::manager::JobManager;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mole_api=debug,mole_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        working_directory = %config.working_directory.display(),
        "Loaded server configuration"
    );

    // --- Structure source ---
    let source = RemoteStructureSource::new(
        config.coordinate_server_url.clone(),
        config.assembly_metadata_url.clone(),
        config.fetch_timeout(),
    )
    .expect("Failed to build structure source");

    // --- Job manager ---
    let manager = JobManager::new(config.manager_config(), Arc::new(source))
        .expect("Failed to initialize job manager");

    let pruned = manager.prune_stale_processes().await;
    tracing::info!(
        pruned,
        adopted = manager.registry().len(),
        "Process registry reconciled"
    );

    // --- App state ---
    let state = AppState {
        manager,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // Tool processes keep running and stay in the registry; the next start
    // adopts or prunes them.
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
