//! Simulation server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `rgrr-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Create the simulation registry
//! 4. Serve HTTP until terminated

use std::path::Path;
use std::sync::Arc;

use rgrr_core::config::{AppConfig, ConfigError};
use rgrr_server::{AppState, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Path of the configuration file, relative to the working directory.
const CONFIG_PATH: &str = "rgrr-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the server
/// fails to bind or serve.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        host = config.server.host,
        port = config.server.port,
        bin_count = config.histogram.bin_count,
        max_nodes = config.limits.max_nodes,
        max_epochs = config.limits.max_epochs,
        max_stored_values = config.limits.max_stored_values,
        "Configuration loaded"
    );

    let state = Arc::new(AppState::from_config(&config));
    start_server(&config.server, state).await?;

    info!("rgrr-server stopped");
    Ok(())
}

/// Load `rgrr-config.yaml` if present, otherwise defaults.
fn load_config() -> Result<AppConfig, ConfigError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        AppConfig::from_file(config_path)
    } else {
        AppConfig::parse("")
    }
}
