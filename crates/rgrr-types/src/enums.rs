//! Enumeration types for the simulation API.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of a simulation.
///
/// ```text
/// Created --run()--> Running --success--> Completed
///                            --failure--> Failed
/// ```
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SimulationStatus {
    /// Configuration accepted, not yet executed.
    Created,
    /// Execution is in progress.
    Running,
    /// Execution finished and a result is attached.
    Completed,
    /// Execution failed; the error description is recorded.
    Failed,
}

impl SimulationStatus {
    /// Whether no further transition can happen from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl core::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// How per-bin values of a histogram are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Normalization {
    /// Number of nodes whose value falls in the bin.
    Count,
    /// Count divided by `nodes * bin_width`, so the bars integrate to 1.
    #[default]
    Density,
}
