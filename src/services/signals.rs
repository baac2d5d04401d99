//! Shutdown signal handling.

use crate::services::ServiceManager;
use crate::state::AppState;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

/// Wait for SIGINT/SIGTERM, then drain services and tear down the browser
/// session pool.
pub async fn handle_shutdown_signals(
    manager: ServiceManager,
    state: AppState,
    shutdown_timeout: Duration,
) -> ExitCode {
    wait_for_signal().await;
    info!("shutdown signal received, stopping services");

    manager.shutdown(shutdown_timeout).await;

    // Services are drained, so no request holds a session anymore; every
    // remaining browser can be quit.
    state.session_pool.shutdown().await;

    info!("shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
