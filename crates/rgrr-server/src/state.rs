//! Shared application state for the HTTP server.

use rgrr_core::config::AppConfig;
use rgrr_core::registry::SimulationRegistry;

/// State shared by every handler.
#[derive(Debug, Default)]
pub struct AppState {
    /// Every simulation created through this server.
    pub registry: SimulationRegistry,
}

impl AppState {
    /// Create state with an empty registry using default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state with an empty registry configured from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            registry: SimulationRegistry::from_config(config),
        }
    }
}
