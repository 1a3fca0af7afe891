//! Error types for the simulation registry.

use rgrr_engine::EngineError;
use rgrr_types::{SimulationId, SimulationStatus};

/// Errors returned by [`SimulationRegistry`](crate::registry::SimulationRegistry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The submitted configuration or query was rejected.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// No simulation exists with the given id.
    #[error("simulation {id} not found")]
    NotFound {
        /// The unknown id.
        id: SimulationId,
    },

    /// Results were requested before the simulation completed.
    #[error("simulation {id} has no results (status: {status})")]
    NotCompleted {
        /// The simulation queried.
        id: SimulationId,
        /// Its status at the time of the query.
        status: SimulationStatus,
    },

    /// Execution failed; the simulation is recorded as `failed`.
    #[error("simulation {id} failed: {message}")]
    SimulationRuntime {
        /// The failed simulation.
        id: SimulationId,
        /// The recorded failure description.
        message: String,
    },
}

impl RegistryError {
    /// Classify an engine failure raised while handling simulation `id`.
    ///
    /// Only rejected parameters are the caller's fault; arithmetic and
    /// data failures are runtime errors of that simulation.
    pub fn from_engine(id: SimulationId, err: EngineError) -> Self {
        match err {
            EngineError::InvalidConfiguration(reason) => Self::InvalidConfiguration { reason },
            other => Self::SimulationRuntime {
                id,
                message: other.to_string(),
            },
        }
    }
}
