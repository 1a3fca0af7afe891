//! Listener setup and the serve loop.
//!
//! [`bind`] resolves `host:port` (host names included) and opens the TCP
//! listener; [`serve`] runs the router on it until a shutdown future
//! resolves. [`start_server`] wires both to Ctrl+C for the binary.

use std::future::Future;
use std::io;
use std::sync::Arc;

use rgrr_core::config::ServerConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::router::build_router;
use crate::state::AppState;

/// Failure to open the listener or to keep serving on it.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// `host:port` could not be resolved or bound.
    #[error("cannot listen on {host}:{port}: {source}")]
    Bind {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The accept loop stopped with an I/O error.
    #[error("server stopped: {source}")]
    Serve {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Open the TCP listener described by `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the host does not resolve or the port
/// is unavailable.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|source| ServerError::Bind {
            host: config.host.clone(),
            port: config.port,
            source,
        })
}

/// Serve the simulation API on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns. Runs
/// already started keep executing in the background.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the accept loop fails.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "Simulation server listening"),
        Err(e) => warn!(error = %e, "Listening on an unknown local address"),
    }

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| ServerError::Serve { source })
}

/// Bind according to `config` and serve until Ctrl+C.
///
/// # Errors
///
/// See [`bind`] and [`serve`].
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => warn!(error = %e, "Ctrl+C handler unavailable; serving until killed"),
    }
}
