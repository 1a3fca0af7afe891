//! Epoch driver: runs a validated configuration to completion.
//!
//! [`run_with_callback`] seeds one [`ChaCha8Rng`] from the configuration,
//! records snapshot 0, then for every epoch applies the configured
//! operations in order and records the post-epoch snapshot. The generator
//! advances monotonically and is never re-seeded, so the same
//! configuration always yields the same snapshot sequence.
//!
//! The driver is synchronous and CPU-bound; async callers run it on a
//! blocking thread.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rgrr_types::EpochStats;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::operation::OperationOutcome;
use crate::population::{EpochSnapshot, NodePopulation};

/// Callback invoked after each epoch snapshot is recorded.
///
/// Snapshot 0 is reported as well, with all flows zero.
pub trait EpochCallback: Send {
    /// Called after an epoch completes successfully.
    fn on_epoch(&mut self, stats: &EpochStats);
}

/// A no-op epoch callback.
pub struct NoOpCallback;

impl EpochCallback for NoOpCallback {
    fn on_epoch(&mut self, _stats: &EpochStats) {}
}

/// Everything produced by one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    /// Snapshots `0..=epoch_count`, in epoch order.
    pub snapshots: Vec<EpochSnapshot>,
    /// Summary statistics, one per snapshot.
    pub stats: Vec<EpochStats>,
}

/// Run `config` without progress reporting.
///
/// # Errors
///
/// Returns [`EngineError::InvalidConfiguration`] if the configuration is
/// malformed (see [`SimulationConfig::check_parameters`]), or [`EngineError::ArithmeticOverflow`] if resources exceed
/// the representable range during execution.
pub fn run(config: &SimulationConfig) -> Result<SimulationRun, EngineError> {
    run_with_callback(config, &mut NoOpCallback)
}

/// Run `config`, reporting every recorded snapshot to `callback`.
///
/// # Errors
///
/// See [`run`].
pub fn run_with_callback(
    config: &SimulationConfig,
    callback: &mut dyn EpochCallback,
) -> Result<SimulationRun, EngineError> {
    config.check_parameters()?;
    let mut population = NodePopulation::new(config.node_count, config.resources_per_node)?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let capacity = usize::try_from(config.epoch_count)
        .unwrap_or(usize::MAX)
        .saturating_add(1);
    let mut snapshots = Vec::with_capacity(capacity);
    let mut stats = Vec::with_capacity(capacity);

    info!(
        nodes = config.node_count,
        epochs = config.epoch_count,
        operations = config.operations.len(),
        seed = config.seed,
        "Simulation starting"
    );

    let initial = population.snapshot(0);
    let initial_stats = epoch_stats(&initial, &OperationOutcome::default());
    callback.on_epoch(&initial_stats);
    snapshots.push(initial);
    stats.push(initial_stats);

    for epoch in 1..=config.epoch_count {
        let mut flows = OperationOutcome::default();
        for operation in &config.operations {
            let outcome = operation.apply(&mut population, &mut rng)?;
            flows.absorb(outcome)?;
        }

        let snapshot = population.snapshot(epoch);
        #[cfg(debug_assertions)]
        if let Some(previous) = snapshots.last() {
            check_conservation(previous, &snapshot, &flows);
        }

        let summary = epoch_stats(&snapshot, &flows);
        debug!(
            epoch,
            total = summary.total,
            min = summary.min,
            max = summary.max,
            "Epoch complete"
        );
        callback.on_epoch(&summary);
        snapshots.push(snapshot);
        stats.push(summary);
    }

    info!(
        epochs = config.epoch_count,
        final_total = population.total(),
        "Simulation finished"
    );

    Ok(SimulationRun { snapshots, stats })
}

/// Summary statistics for one snapshot and the flows that produced it.
pub fn epoch_stats(snapshot: &EpochSnapshot, flows: &OperationOutcome) -> EpochStats {
    EpochStats {
        epoch: snapshot.epoch,
        total: snapshot.total,
        min: snapshot.min(),
        max: snapshot.max(),
        mean: snapshot.mean(),
        resources_added: flows.resources_added,
        tax_collected: flows.tax_collected,
        expenditure_incurred: flows.expenditure_incurred,
    }
}

#[cfg(debug_assertions)]
fn check_conservation(previous: &EpochSnapshot, current: &EpochSnapshot, flows: &OperationOutcome) {
    use crate::conservation::{ConservationResult, verify_epoch};

    if let ConservationResult::Anomaly(anomaly) = verify_epoch(previous, current, flows) {
        tracing::warn!(
            epoch = anomaly.epoch,
            expected = ?anomaly.expected,
            recorded = anomaly.recorded,
            "{}",
            anomaly.message
        );
    }
}
