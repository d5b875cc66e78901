//! smm-server: HTTP transport for course ingestion and delivery.
//!
//! Ties the smm-* crates together into a running axum application:
//!
//! - `/api/courses/*` upload, edit, star and download routes
//! - API-key authentication and per-request IDs
//! - Prometheus metrics and an SSE stream of course events
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use smm_core::config::Config;
use tokio_util::sync::CancellationToken;

pub use context::AppContext;
pub use router::build_router;

/// Start the smmdb server.
///
/// Opens the database, builds the [`AppContext`] and serves until a shutdown
/// signal arrives or `cancel` is triggered. Pending download cleanups run
/// before this returns.
pub async fn start(config: Config, cancel: CancellationToken) -> smm_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let db_path = config.server.db_path.clone();
    let existed = db_path.exists();
    let db = smm_db::init_pool(&db_path)?;
    if existed {
        tracing::info!("Database opened (existing) at {}", db_path.display());
    } else {
        tracing::info!("Database created (new) at {}", db_path.display());
    }

    if let Some(ref dir) = config.storage.uploads_dir {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Archiving uploads to {}", dir.display());
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| smm_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(db, config, cancel.clone());
    let app = build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| smm_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // Flush staged downloads and end SSE streams.
    cancel.cancel();

    served.map_err(|e| smm_core::Error::Internal(format!("Server error: {e}")))?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM) or cancellation.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
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
                tracing::warn!("Failed to install SIGTERM handler: {e}");
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
