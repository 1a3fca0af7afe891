//! Request and response payloads of the simulation API.
//!
//! Field names and array orderings here are the contract the dashboard
//! and other automation depend on: `bin_edges` ascending,
//! `epoch_distributions` indexed by epoch starting at 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::SimulationStatus;
use crate::ids::SimulationId;

/// One operation as submitted on the wire, dispatched by its `type` tag.
///
/// Numeric parameters are deliberately wide and signed so that out-of-range
/// values reach validation (and produce an invalid-configuration error)
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum OperationSpec {
    /// Rich-get-richer allocation of `resources_added` units.
    Preferential {
        /// Units to allocate this epoch.
        resources_added: i64,
    },
    /// Each unit goes to a node chosen uniformly at random.
    Random {
        /// Units to allocate this epoch.
        resources_added: i64,
    },
    /// Units are split evenly, remainder to the lowest-indexed nodes.
    Uniform {
        /// Units to allocate this epoch.
        resources_added: i64,
    },
    /// All units go to one chosen node.
    Specific {
        /// Units to allocate this epoch.
        resources_added: i64,
        /// Index of the receiving node, in `[0, nodes)`.
        target_node: i64,
    },
    /// Proportional tax redistributed uniformly.
    Tax {
        /// Fraction of each node's holdings collected, in `[0, 1]`.
        tax_rate: f64,
    },
    /// Flat per-node deduction, floored at zero.
    Expenditure {
        /// Amount deducted from every node.
        expenditure: f64,
    },
}

/// Body of `POST /simulations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationRequest {
    /// Number of nodes (at least 1).
    pub nodes: i64,
    /// Number of epochs to run (0 is allowed).
    pub epochs: i64,
    /// Initial resources held by every node.
    #[serde(default)]
    pub resources_per_node: i64,
    /// Operations applied in order, once per epoch.
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
    /// Random seed; generated and recorded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Response of `POST /simulations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreatedResponse {
    /// The newly assigned simulation id.
    pub id: SimulationId,
}

/// Response of `POST /simulations/{id}/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunResponse {
    /// The simulation that was run.
    pub id: SimulationId,
    /// Status at the time the response was produced.
    pub status: SimulationStatus,
    /// Failure description when `status` is `failed`.
    pub error: Option<String>,
}

/// Response of `GET /simulations/{id}`: configuration echo plus lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationView {
    /// Simulation id.
    pub id: SimulationId,
    /// Number of nodes.
    pub nodes: u64,
    /// Number of epochs.
    pub epochs: u32,
    /// Initial resources per node.
    pub resources_per_node: u64,
    /// Effective seed (submitted or generated).
    pub seed: u64,
    /// Configured operations, in application order.
    pub operations: Vec<OperationSpec>,
    /// Current lifecycle status.
    pub status: SimulationStatus,
    /// Failure description, present only when `status` is `failed`.
    pub error: Option<String>,
    /// Epochs finished so far by the running (or finished) execution.
    pub epochs_completed: u32,
    /// When the simulation was created.
    pub created_at: DateTime<Utc>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Response of `GET /simulations/{id}/histograms`.
///
/// `bin_edges` has `N + 1` ascending entries shared by every epoch;
/// each entry of `epoch_distributions` has `N` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HistogramResult {
    /// Shared bin boundaries, ascending.
    pub bin_edges: Vec<f64>,
    /// Per-epoch bin values, epoch 0 (initial state) first.
    pub epoch_distributions: Vec<Vec<f64>>,
}

impl HistogramResult {
    /// Number of bins.
    pub fn bin_count(&self) -> usize {
        self.bin_edges.len().saturating_sub(1)
    }
}

/// Summary of the population at one epoch boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EpochStats {
    /// Epoch index; 0 is the initial state.
    pub epoch: u32,
    /// Sum of all node resources.
    pub total: u64,
    /// Smallest node holding.
    pub min: u64,
    /// Largest node holding.
    pub max: u64,
    /// Mean node holding.
    pub mean: f64,
    /// Units added by distribution operations during this epoch.
    pub resources_added: u64,
    /// Units collected (and redistributed) by tax during this epoch.
    pub tax_collected: u64,
    /// Units removed by expenditure during this epoch.
    pub expenditure_incurred: u64,
}
