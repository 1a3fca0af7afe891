//! Simulation engine for the rich-get-richer model.
//!
//! This crate evolves a population of resource-holding nodes across
//! discrete epochs and turns the recorded snapshots into histograms. It is
//! synchronous and has no knowledge of identifiers, lifecycles, or HTTP.
//!
//! # Modules
//!
//! - [`config`] -- Validated [`SimulationConfig`] built from a wire request,
//!   plus the [`ConfigLimits`] applied during validation.
//! - [`population`] -- [`NodePopulation`] with exact integer holdings and
//!   per-node fractional carries for tax and expenditure.
//! - [`sampler`] -- Fenwick-tree weighted sampler behind preferential
//!   attachment.
//! - [`operation`] -- The closed [`Operation`] set and its executor.
//! - [`driver`] -- The seeded epoch loop and [`EpochCallback`] progress hook.
//! - [`histogram`] -- Shared-edge histogram aggregation.
//! - [`conservation`] -- Per-epoch resource conservation checks.
//! - [`error`] -- [`EngineError`].
//!
//! # Determinism
//!
//! One `ChaCha8` generator is seeded per run and advanced monotonically.
//! Running the same [`SimulationConfig`] twice yields identical snapshots
//! on every platform.

pub mod config;
pub mod conservation;
pub mod driver;
pub mod error;
pub mod histogram;
pub mod operation;
pub mod population;
pub mod sampler;

pub use config::{ConfigLimits, SimulationConfig};
pub use driver::{EpochCallback, NoOpCallback, SimulationRun, run, run_with_callback};
pub use error::EngineError;
pub use histogram::{DEFAULT_BIN_COUNT, HistogramOptions, bin};
pub use operation::{Operation, OperationOutcome};
pub use population::{EpochSnapshot, NodePopulation, Obligation};
