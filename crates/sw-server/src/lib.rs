//! sw-server: supervisor runtime and HTTP control API.
//!
//! This crate ties the other sw-* crates into a running service:
//!
//! - per-channel state backed by the snapshot file
//! - the supervisor that starts, stops and replaces relay workers
//! - a background health monitor that restarts dead workers
//! - the Axum control API
//! - graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod monitor;
pub mod router;
pub mod routes;
pub mod state;
pub mod supervisor;

use std::net::SocketAddr;

use sw_core::config::Config;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;

/// Start the streamwarden service.
///
/// Loads the assignment snapshot, optionally resumes the workers that were
/// running when the previous process exited, then serves the control API
/// until a shutdown signal arrives. Every worker is stopped before
/// returning.
pub async fn start(config: Config) -> sw_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    create_storage_dirs(&config)?;

    let ctx = AppContext::new(config);
    for info in ctx.tools.check_all().await {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    if ctx.config.supervisor.resume_on_start {
        let channels = ctx.state.take_resumable();
        if !channels.is_empty() {
            ctx.supervisor.resume(channels).await;
        }
    }

    let cancel = CancellationToken::new();
    let monitor_handle = ctx.health_monitor().spawn(cancel.clone());

    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port)
        .parse()
        .map_err(|e| sw_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx.clone(), ctx.config.server.static_dir.clone());

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| sw_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // Stop the monitor before tearing down workers so it cannot respawn them.
    cancel.cancel();
    if let Err(e) = monitor_handle.await {
        tracing::error!("Health monitor task failed: {e}");
    }
    ctx.supervisor.shutdown().await;

    served.map_err(|e| sw_core::Error::Internal(format!("Server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

fn create_storage_dirs(config: &Config) -> sw_core::Result<()> {
    let storage = &config.storage;
    let parents = [
        storage.state_file.parent(),
        storage.history_file.parent(),
        Some(storage.log_dir.as_path()),
    ];
    for dir in parents.into_iter().flatten() {
        if dir.as_os_str().is_empty() || dir.exists() {
            continue;
        }
        std::fs::create_dir_all(dir).map_err(|e| sw_core::Error::Io { source: e })?;
        tracing::info!("Created directory {}", dir.display());
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_dirs_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.state_file = dir.path().join("data/state.json");
        config.storage.history_file = dir.path().join("data/history.jsonl");
        config.storage.log_dir = dir.path().join("logs");

        create_storage_dirs(&config).unwrap();
        assert!(dir.path().join("data").is_dir());
        assert!(dir.path().join("logs").is_dir());
    }
}
