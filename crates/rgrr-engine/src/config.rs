//! Validated simulation configuration.
//!
//! A [`SimulationConfig`] is built from a wire [`SimulationRequest`] by
//! [`SimulationConfig::from_request`], which checks every parameter
//! constraint up front so that an accepted configuration only fails at run
//! time on arithmetic overflow.

use rgrr_types::{OperationSpec, SimulationRequest};
use serde::Deserialize;

use crate::error::EngineError;
use crate::operation::Operation;

/// Upper bounds applied to submitted configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConfigLimits {
    /// Largest accepted node count.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: u64,
    /// Largest accepted epoch count.
    #[serde(default = "default_max_epochs")]
    pub max_epochs: u32,
    /// Largest `resources_added` accepted on a single attachment operation.
    #[serde(default = "default_max_resources_per_operation")]
    pub max_resources_per_operation: u64,
    /// Largest `nodes * (epochs + 1)`: the holdings kept across all
    /// snapshots of one run.
    #[serde(default = "default_max_stored_values")]
    pub max_stored_values: u64,
    /// Largest number of random unit draws one run may make.
    #[serde(default = "default_max_unit_draws")]
    pub max_unit_draws: u64,
}

const fn default_max_nodes() -> u64 {
    1_000_000
}

const fn default_max_epochs() -> u32 {
    10_000
}

const fn default_max_resources_per_operation() -> u64 {
    100_000_000
}

const fn default_max_stored_values() -> u64 {
    50_000_000
}

const fn default_max_unit_draws() -> u64 {
    1_000_000_000
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            max_epochs: default_max_epochs(),
            max_resources_per_operation: default_max_resources_per_operation(),
            max_stored_values: default_max_stored_values(),
            max_unit_draws: default_max_unit_draws(),
        }
    }
}

/// The immutable parameters of one simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of nodes, at least 1.
    pub node_count: usize,
    /// Number of epochs to execute.
    pub epoch_count: u32,
    /// Initial resources held by every node.
    pub resources_per_node: u64,
    /// Operations applied in order every epoch.
    pub operations: Vec<Operation>,
    /// Seed for the simulation's random stream.
    pub seed: u64,
}

impl SimulationConfig {
    /// Validate a request and resolve it into a configuration.
    ///
    /// A missing seed is filled from `fallback_seed`, so that every
    /// accepted configuration records the seed it will run with.
    pub fn from_request(
        request: &SimulationRequest,
        limits: &ConfigLimits,
        fallback_seed: impl FnOnce() -> u64,
    ) -> Result<Self, EngineError> {
        let nodes = u64::try_from(request.nodes).map_err(|_negative| {
            EngineError::invalid(format!("nodes must be at least 1, got {}", request.nodes))
        })?;
        let node_count = usize::try_from(nodes).map_err(|_too_large| {
            EngineError::invalid(format!("nodes {nodes} is not addressable on this platform"))
        })?;
        let epoch_count = u32::try_from(request.epochs).map_err(|_out_of_range| {
            EngineError::invalid(format!(
                "epochs must be within [0, {}], got {}",
                limits.max_epochs, request.epochs
            ))
        })?;
        let resources_per_node = u64::try_from(request.resources_per_node).map_err(|_negative| {
            EngineError::invalid(format!(
                "resources_per_node must be non-negative, got {}",
                request.resources_per_node
            ))
        })?;
        let operations = request
            .operations
            .iter()
            .enumerate()
            .map(|(position, spec)| {
                Operation::from_spec(spec, limits).map_err(|e| match e {
                    EngineError::InvalidConfiguration(reason) => EngineError::InvalidConfiguration(
                        format!("operations[{position}]: {reason}"),
                    ),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            node_count,
            epoch_count,
            resources_per_node,
            operations,
            seed: request.seed.unwrap_or_else(fallback_seed),
        };
        config.validate(limits)?;
        Ok(config)
    }

    /// Check every constraint on an already typed configuration, including
    /// the size limits.
    pub fn validate(&self, limits: &ConfigLimits) -> Result<(), EngineError> {
        self.check_parameters()?;
        let nodes = self.node_count_u64();
        if nodes > limits.max_nodes {
            return Err(EngineError::invalid(format!(
                "nodes {nodes} exceeds the limit of {}",
                limits.max_nodes
            )));
        }
        if self.epoch_count > limits.max_epochs {
            return Err(EngineError::invalid(format!(
                "epochs {} exceeds the limit of {}",
                self.epoch_count, limits.max_epochs
            )));
        }
        self.operations
            .iter()
            .try_for_each(|operation| operation.validate(limits))?;

        let stored = nodes.checked_mul(u64::from(self.epoch_count).saturating_add(1));
        match stored {
            Some(stored) if stored <= limits.max_stored_values => {}
            _ => {
                return Err(EngineError::invalid(format!(
                    "{nodes} nodes over {} epochs exceeds the limit of {} stored values",
                    self.epoch_count, limits.max_stored_values
                )));
            }
        }

        let draws = self
            .operations
            .iter()
            .try_fold(0_u64, |acc, operation| acc.checked_add(operation.unit_draws()))
            .and_then(|per_epoch| per_epoch.checked_mul(u64::from(self.epoch_count)));
        match draws {
            Some(draws) if draws <= limits.max_unit_draws => Ok(()),
            _ => Err(EngineError::invalid(format!(
                "operations over {} epochs exceed the limit of {} random draws",
                self.epoch_count, limits.max_unit_draws
            ))),
        }
    }

    /// Check the constraints that hold regardless of limits: at least one
    /// node, a representable initial total, valid operation parameters,
    /// and targets that name existing nodes.
    pub fn check_parameters(&self) -> Result<(), EngineError> {
        if self.node_count == 0 {
            return Err(EngineError::invalid("nodes must be at least 1, got 0"));
        }
        let nodes = self.node_count_u64();
        if nodes.checked_mul(self.resources_per_node).is_none() {
            return Err(EngineError::invalid(format!(
                "initial total of {nodes} nodes x {} resources is not representable",
                self.resources_per_node
            )));
        }
        for (position, operation) in self.operations.iter().enumerate() {
            operation.check_parameters().map_err(|e| match e {
                EngineError::InvalidConfiguration(reason) => {
                    EngineError::InvalidConfiguration(format!("operations[{position}]: {reason}"))
                }
                other => other,
            })?;
            match *operation {
                Operation::SpecificAttachment { target_node, .. }
                    if target_node >= self.node_count =>
                {
                    return Err(EngineError::invalid(format!(
                        "operations[{position}]: specific: target_node {target_node} \
                         is not one of the {} nodes",
                        self.node_count
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Wire form of the configured operations, in application order.
    pub fn operation_specs(&self) -> Vec<OperationSpec> {
        self.operations.iter().map(Operation::to_spec).collect()
    }

    /// Node count as reported on the wire.
    pub fn node_count_u64(&self) -> u64 {
        u64::try_from(self.node_count).unwrap_or(u64::MAX)
    }
}
