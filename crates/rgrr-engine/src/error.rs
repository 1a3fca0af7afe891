//! Error types for the `rgrr-engine` crate.
//!
//! All fallible operations in this crate return [`EngineError`].

/// Errors that can occur while validating or executing a simulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The submitted configuration violates a parameter constraint.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A resource sum or weight exceeded the representable range.
    #[error("arithmetic overflow while {context}")]
    ArithmeticOverflow {
        /// What the engine was computing when the overflow happened.
        context: &'static str,
    },

    /// A node index outside the population was addressed.
    #[error("node index {index} out of range for population of {len}")]
    NodeOutOfRange {
        /// The requested index.
        index: usize,
        /// The population size.
        len: usize,
    },

    /// An operation was applied to a population without nodes.
    #[error("population has no nodes")]
    EmptyPopulation,

    /// The histogram aggregator was given no snapshots.
    #[error("no snapshots to aggregate")]
    EmptySnapshots,
}

impl EngineError {
    /// Shorthand for an [`InvalidConfiguration`](Self::InvalidConfiguration) error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Whether this error stems from bad input rather than execution.
    pub const fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
