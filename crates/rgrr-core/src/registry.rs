//! In-memory registry of simulations and their run lifecycle.
//!
//! Each simulation is an independent entry with its own lock, so runs of
//! different simulations proceed concurrently and never observe each
//! other's state. The map itself is only locked to insert or look up
//! entries.
//!
//! Execution happens on a blocking worker owned by a detached task. A
//! caller that stops waiting for [`SimulationRegistry::run`] does not
//! cancel the run; the entry still reaches `completed` or `failed`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use rgrr_engine::{
    ConfigLimits, EngineError, EpochCallback, EpochSnapshot, HistogramOptions, SimulationConfig,
    bin, run_with_callback,
};
use rgrr_types::{
    EpochStats, HistogramResult, RunResponse, SimulationId, SimulationRequest, SimulationStatus,
    SimulationView,
};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::RegistryError;

/// Results attached to a completed simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    /// Snapshots `0..=epochs`.
    pub snapshots: Vec<EpochSnapshot>,
    /// Per-snapshot statistics.
    pub stats: Vec<EpochStats>,
    /// Histogram under the registry's default options.
    pub histogram: HistogramResult,
}

/// Mutable lifecycle state of one simulation.
#[derive(Debug)]
struct Lifecycle {
    status: SimulationStatus,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    output: Option<Arc<SimulationOutput>>,
}

/// One registered simulation.
#[derive(Debug)]
struct SimulationEntry {
    id: SimulationId,
    config: SimulationConfig,
    created_at: DateTime<Utc>,
    lifecycle: Mutex<Lifecycle>,
    /// Mirrors `lifecycle.status`; waiters block on it until terminal.
    status_tx: watch::Sender<SimulationStatus>,
    epochs_completed: AtomicU32,
}

impl SimulationEntry {
    fn new(id: SimulationId, config: SimulationConfig) -> Self {
        let (status_tx, _) = watch::channel(SimulationStatus::Created);
        Self {
            id,
            config,
            created_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle {
                status: SimulationStatus::Created,
                error: None,
                started_at: None,
                finished_at: None,
                output: None,
            }),
            status_tx,
            epochs_completed: AtomicU32::new(0),
        }
    }

    async fn view(&self) -> SimulationView {
        let lifecycle = self.lifecycle.lock().await;
        SimulationView {
            id: self.id,
            nodes: self.config.node_count_u64(),
            epochs: self.config.epoch_count,
            resources_per_node: self.config.resources_per_node,
            seed: self.config.seed,
            operations: self.config.operation_specs(),
            status: lifecycle.status,
            error: lifecycle.error.clone(),
            epochs_completed: self.epochs_completed.load(Ordering::Relaxed),
            created_at: self.created_at,
            started_at: lifecycle.started_at,
            finished_at: lifecycle.finished_at,
        }
    }

    /// Record the terminal outcome, then wake waiters.
    async fn finish(&self, outcome: Result<SimulationOutput, String>) {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.finished_at = Some(Utc::now());
        let status = match outcome {
            Ok(output) => {
                info!(
                    simulation_id = %self.id,
                    epochs = self.config.epoch_count,
                    "Simulation completed"
                );
                lifecycle.output = Some(Arc::new(output));
                SimulationStatus::Completed
            }
            Err(message) => {
                warn!(simulation_id = %self.id, error = %message, "Simulation failed");
                lifecycle.error = Some(message);
                SimulationStatus::Failed
            }
        };
        lifecycle.status = status;
        self.status_tx.send_replace(status);
    }
}

/// Stores the last finished epoch for progress reporting.
struct Progress<'a> {
    epochs_completed: &'a AtomicU32,
}

impl EpochCallback for Progress<'_> {
    fn on_epoch(&mut self, stats: &EpochStats) {
        self.epochs_completed.store(stats.epoch, Ordering::Relaxed);
    }
}

/// Run the engine and build the stored output. Runs on a blocking thread.
fn execute(
    entry: &SimulationEntry,
    histogram: &HistogramOptions,
) -> Result<SimulationOutput, EngineError> {
    let mut progress = Progress {
        epochs_completed: &entry.epochs_completed,
    };
    let run = run_with_callback(&entry.config, &mut progress)?;
    let histogram = bin(&run.snapshots, histogram)?;
    Ok(SimulationOutput {
        snapshots: run.snapshots,
        stats: run.stats,
        histogram,
    })
}

fn spawn_execution(entry: Arc<SimulationEntry>, histogram: HistogramOptions) {
    tokio::spawn(async move {
        let worker = Arc::clone(&entry);
        let joined = tokio::task::spawn_blocking(move || execute(&worker, &histogram)).await;
        let outcome = match joined {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("execution task aborted: {e}")),
        };
        entry.finish(outcome).await;
    });
}

/// Registry of every simulation created by this process.
#[derive(Debug)]
pub struct SimulationRegistry {
    simulations: RwLock<BTreeMap<SimulationId, Arc<SimulationEntry>>>,
    limits: ConfigLimits,
    histogram_defaults: HistogramOptions,
}

impl Default for SimulationRegistry {
    fn default() -> Self {
        Self::new(ConfigLimits::default(), HistogramOptions::default())
    }
}

impl SimulationRegistry {
    /// Create an empty registry.
    pub fn new(limits: ConfigLimits, histogram_defaults: HistogramOptions) -> Self {
        Self {
            simulations: RwLock::new(BTreeMap::new()),
            limits,
            histogram_defaults,
        }
    }

    /// Create an empty registry using the limits and histogram defaults
    /// from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.limits, config.histogram)
    }

    /// Histogram options used when a request supplies none.
    pub const fn histogram_defaults(&self) -> &HistogramOptions {
        &self.histogram_defaults
    }

    /// Number of registered simulations.
    pub async fn len(&self) -> usize {
        self.simulations.read().await.len()
    }

    /// Whether no simulation has been registered.
    pub async fn is_empty(&self) -> bool {
        self.simulations.read().await.is_empty()
    }

    /// Validate `request` and register a new simulation in `created`.
    ///
    /// A missing seed is generated here and stored with the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfiguration`] if validation fails;
    /// nothing is registered in that case.
    pub async fn create(&self, request: &SimulationRequest) -> Result<SimulationId, RegistryError> {
        let id = SimulationId::new();
        let config = SimulationConfig::from_request(request, &self.limits, rand::random)
            .map_err(|e| RegistryError::from_engine(id, e))?;
        info!(
            simulation_id = %id,
            nodes = config.node_count,
            epochs = config.epoch_count,
            seed = config.seed,
            "Simulation created"
        );
        let entry = Arc::new(SimulationEntry::new(id, config));
        self.simulations.write().await.insert(id, entry);
        Ok(id)
    }

    /// Begin execution if the simulation is still `created`, without
    /// waiting for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub async fn start(&self, id: SimulationId) -> Result<RunResponse, RegistryError> {
        let entry = self.entry(id).await?;
        Ok(self.trigger(&entry).await)
    }

    /// Execute the simulation and wait for its terminal status.
    ///
    /// Concurrent calls for the same id share one execution. Calling `run`
    /// on a finished simulation returns its recorded outcome without
    /// executing again.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id and
    /// [`RegistryError::SimulationRuntime`] if execution failed.
    pub async fn run(&self, id: SimulationId) -> Result<RunResponse, RegistryError> {
        let entry = self.entry(id).await?;
        let mut status_rx = entry.status_tx.subscribe();
        self.trigger(&entry).await;

        status_rx
            .wait_for(|status| status.is_terminal())
            .await
            .map_err(|_closed| RegistryError::SimulationRuntime {
                id,
                message: "execution ended without recording an outcome".to_owned(),
            })?;

        let lifecycle = entry.lifecycle.lock().await;
        match lifecycle.status {
            SimulationStatus::Failed => Err(RegistryError::SimulationRuntime {
                id,
                message: lifecycle.error.clone().unwrap_or_default(),
            }),
            status => Ok(RunResponse {
                id,
                status,
                error: None,
            }),
        }
    }

    /// Configuration echo and lifecycle of one simulation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id.
    pub async fn get(&self, id: SimulationId) -> Result<SimulationView, RegistryError> {
        let entry = self.entry(id).await?;
        Ok(entry.view().await)
    }

    /// Ids of every registered simulation, in ascending order.
    pub async fn list(&self) -> Vec<SimulationId> {
        self.simulations.read().await.keys().copied().collect()
    }

    /// Histogram of a completed simulation.
    ///
    /// With `options` of `None` (or equal to the defaults) the histogram
    /// computed at completion is returned; otherwise it is recomputed from
    /// the stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown id,
    /// [`RegistryError::NotCompleted`] if there are no results yet, and
    /// [`RegistryError::InvalidConfiguration`] for unusable options.
    pub async fn histogram(
        &self,
        id: SimulationId,
        options: Option<HistogramOptions>,
    ) -> Result<HistogramResult, RegistryError> {
        let output = self.output(id).await?;
        let options = match options {
            Some(options) if options != self.histogram_defaults => options,
            _ => return Ok(output.histogram.clone()),
        };

        tokio::task::spawn_blocking(move || bin(&output.snapshots, &options))
            .await
            .map_err(|e| RegistryError::SimulationRuntime {
                id,
                message: format!("histogram task aborted: {e}"),
            })?
            .map_err(|e| RegistryError::from_engine(id, e))
    }

    /// Raw per-epoch resources of a completed simulation, epoch 0 first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] or [`RegistryError::NotCompleted`].
    pub async fn distributions(&self, id: SimulationId) -> Result<Vec<Vec<u64>>, RegistryError> {
        let output = self.output(id).await?;
        Ok(output
            .snapshots
            .iter()
            .map(|snapshot| snapshot.resources.clone())
            .collect())
    }

    /// Per-epoch statistics of a completed simulation, epoch 0 first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] or [`RegistryError::NotCompleted`].
    pub async fn stats(&self, id: SimulationId) -> Result<Vec<EpochStats>, RegistryError> {
        let output = self.output(id).await?;
        Ok(output.stats.clone())
    }

    /// Stored results of a completed simulation.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] or [`RegistryError::NotCompleted`].
    pub async fn output(&self, id: SimulationId) -> Result<Arc<SimulationOutput>, RegistryError> {
        let entry = self.entry(id).await?;
        let lifecycle = entry.lifecycle.lock().await;
        lifecycle
            .output
            .as_ref()
            .map(Arc::clone)
            .ok_or(RegistryError::NotCompleted {
                id,
                status: lifecycle.status,
            })
    }

    async fn entry(&self, id: SimulationId) -> Result<Arc<SimulationEntry>, RegistryError> {
        self.simulations
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Move `created` to `running` and spawn the execution. Later calls
    /// only report the current status.
    async fn trigger(&self, entry: &Arc<SimulationEntry>) -> RunResponse {
        let mut lifecycle = entry.lifecycle.lock().await;
        if lifecycle.status == SimulationStatus::Created {
            lifecycle.status = SimulationStatus::Running;
            lifecycle.started_at = Some(Utc::now());
            entry.status_tx.send_replace(SimulationStatus::Running);
            info!(simulation_id = %entry.id, "Simulation running");
            spawn_execution(Arc::clone(entry), self.histogram_defaults);
        }
        RunResponse {
            id: entry.id,
            status: lifecycle.status,
            error: lifecycle.error.clone(),
        }
    }
}
