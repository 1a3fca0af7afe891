//! End-to-end lifecycle tests for the simulation registry.

#![allow(clippy::unwrap_used)]

use rgrr_core::error::RegistryError;
use rgrr_core::registry::SimulationRegistry;
use rgrr_engine::{ConfigLimits, HistogramOptions};
use rgrr_types::{Normalization, OperationSpec, SimulationId, SimulationRequest, SimulationStatus};

fn request(nodes: i64, epochs: i64, resources_per_node: i64, operations: Vec<OperationSpec>) -> SimulationRequest {
    SimulationRequest {
        nodes,
        epochs,
        resources_per_node,
        operations,
        seed: Some(12_345),
    }
}

fn mixed_request() -> SimulationRequest {
    request(
        50,
        20,
        3,
        vec![
            OperationSpec::Preferential { resources_added: 100 },
            OperationSpec::Tax { tax_rate: 0.05 },
            OperationSpec::Expenditure { expenditure: 0.5 },
        ],
    )
}

/// Two simulations that pass validation but overflow on the first epoch.
fn overflowing_request() -> SimulationRequest {
    request(
        2,
        1,
        i64::MAX,
        vec![OperationSpec::Uniform { resources_added: 3 }],
    )
}

#[tokio::test]
async fn create_then_run_reaches_completed() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&mixed_request()).await.unwrap();

    let view = registry.get(id).await.unwrap();
    assert_eq!(view.status, SimulationStatus::Created);
    assert_eq!(view.nodes, 50);
    assert_eq!(view.seed, 12_345);
    assert!(view.started_at.is_none());

    let response = registry.run(id).await.unwrap();
    assert_eq!(response.status, SimulationStatus::Completed);
    assert!(response.error.is_none());

    let view = registry.get(id).await.unwrap();
    assert_eq!(view.status, SimulationStatus::Completed);
    assert_eq!(view.epochs_completed, 20);
    assert!(view.started_at.is_some());
    assert!(view.finished_at.is_some());

    let histogram = registry.histogram(id, None).await.unwrap();
    assert_eq!(histogram.bin_edges.len(), 21);
    assert_eq!(histogram.epoch_distributions.len(), 21);
    assert!(histogram.epoch_distributions.iter().all(|d| d.len() == 20));
}

#[tokio::test]
async fn same_seed_is_reproducible_across_registries() {
    let first = SimulationRegistry::default();
    let second = SimulationRegistry::default();

    let a = first.create(&mixed_request()).await.unwrap();
    let b = second.create(&mixed_request()).await.unwrap();
    first.run(a).await.unwrap();
    second.run(b).await.unwrap();

    assert_eq!(
        first.histogram(a, None).await.unwrap(),
        second.histogram(b, None).await.unwrap()
    );
    assert_eq!(
        first.distributions(a).await.unwrap(),
        second.distributions(b).await.unwrap()
    );
}

#[tokio::test]
async fn missing_seed_is_generated_and_reported() {
    let registry = SimulationRegistry::default();
    let mut req = mixed_request();
    req.seed = None;
    let id = registry.create(&req).await.unwrap();
    let seed = registry.get(id).await.unwrap().seed;

    // Replaying with the reported seed reproduces the run.
    registry.run(id).await.unwrap();
    req.seed = Some(seed);
    let replay = registry.create(&req).await.unwrap();
    registry.run(replay).await.unwrap();
    assert_eq!(
        registry.distributions(id).await.unwrap(),
        registry.distributions(replay).await.unwrap()
    );
}

#[tokio::test]
async fn invalid_configuration_registers_nothing() {
    let registry = SimulationRegistry::default();
    let bad = [
        request(0, 1, 1, Vec::new()),
        request(1, -1, 1, Vec::new()),
        request(1, 1, 1, vec![OperationSpec::Tax { tax_rate: 1.5 }]),
        request(1, 1, 1, vec![OperationSpec::Expenditure { expenditure: -2.0 }]),
        request(1, 1, 1, vec![OperationSpec::Random { resources_added: -1 }]),
    ];
    for req in &bad {
        let result = registry.create(req).await;
        assert!(
            matches!(result, Err(RegistryError::InvalidConfiguration { .. })),
            "{req:?} -> {result:?}"
        );
    }
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn limits_are_enforced_at_creation() {
    let limits = ConfigLimits {
        max_nodes: 10,
        max_epochs: 10,
        max_resources_per_operation: 10,
        max_stored_values: 100,
        max_unit_draws: 100,
    };
    let registry = SimulationRegistry::new(limits, HistogramOptions::default());
    assert!(registry.create(&request(11, 1, 0, Vec::new())).await.is_err());
    assert!(registry.create(&request(5, 11, 0, Vec::new())).await.is_err());
    let too_much = vec![OperationSpec::Preferential { resources_added: 11 }];
    assert!(registry.create(&request(5, 5, 0, too_much)).await.is_err());
    // 10 nodes over 10 epochs keeps 110 holdings.
    assert!(registry.create(&request(10, 10, 0, Vec::new())).await.is_err());
    // 20 draws per epoch over 9 epochs.
    let draws = vec![OperationSpec::Random { resources_added: 10 }; 2];
    assert!(registry.create(&request(10, 9, 0, draws)).await.is_err());
    assert!(registry.create(&request(10, 9, 0, Vec::new())).await.is_ok());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn unknown_id_is_not_found_everywhere() {
    let registry = SimulationRegistry::default();
    let id = SimulationId::new();
    let not_found = |r: &RegistryError| matches!(r, RegistryError::NotFound { id: missing } if *missing == id);

    assert!(registry.get(id).await.is_err_and(|e| not_found(&e)));
    assert!(registry.run(id).await.is_err_and(|e| not_found(&e)));
    assert!(registry.start(id).await.is_err_and(|e| not_found(&e)));
    assert!(registry.histogram(id, None).await.is_err_and(|e| not_found(&e)));
    assert!(registry.distributions(id).await.is_err_and(|e| not_found(&e)));
    assert!(registry.stats(id).await.is_err_and(|e| not_found(&e)));
}

#[tokio::test]
async fn results_before_run_are_not_completed() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&mixed_request()).await.unwrap();
    let result = registry.histogram(id, None).await;
    assert_eq!(
        result,
        Err(RegistryError::NotCompleted {
            id,
            status: SimulationStatus::Created,
        })
    );
}

#[tokio::test]
async fn concurrent_runs_share_one_execution() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&mixed_request()).await.unwrap();

    let (a, b, c) = tokio::join!(registry.run(id), registry.run(id), registry.run(id));
    for response in [a, b, c] {
        assert_eq!(response.unwrap().status, SimulationStatus::Completed);
    }

    let view = registry.get(id).await.unwrap();
    assert_eq!(view.status, SimulationStatus::Completed);
}

#[tokio::test]
async fn rerunning_a_completed_simulation_keeps_its_results() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&mixed_request()).await.unwrap();
    registry.run(id).await.unwrap();
    let before = registry.get(id).await.unwrap();
    let histogram = registry.histogram(id, None).await.unwrap();

    let again = registry.run(id).await.unwrap();
    assert_eq!(again.status, SimulationStatus::Completed);
    let after = registry.get(id).await.unwrap();
    assert_eq!(before.finished_at, after.finished_at);
    assert_eq!(histogram, registry.histogram(id, None).await.unwrap());
}

#[tokio::test]
async fn overflow_is_recorded_as_failed() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&overflowing_request()).await.unwrap();

    let result = registry.run(id).await;
    let Err(RegistryError::SimulationRuntime { id: failed, message }) = result else {
        panic!("expected runtime failure, got {result:?}");
    };
    assert_eq!(failed, id);
    assert!(message.contains("overflow"), "{message}");

    let view = registry.get(id).await.unwrap();
    assert_eq!(view.status, SimulationStatus::Failed);
    assert_eq!(view.error.as_deref(), Some(message.as_str()));
    assert!(matches!(
        registry.stats(id).await,
        Err(RegistryError::NotCompleted {
            status: SimulationStatus::Failed,
            ..
        })
    ));

    // A failed simulation is not executed again.
    assert!(matches!(
        registry.run(id).await,
        Err(RegistryError::SimulationRuntime { .. })
    ));
}

#[tokio::test]
async fn start_returns_without_waiting() {
    let registry = SimulationRegistry::default();
    let id = registry.create(&mixed_request()).await.unwrap();

    let response = registry.start(id).await.unwrap();
    assert_ne!(response.status, SimulationStatus::Created);

    let done = registry.run(id).await.unwrap();
    assert_eq!(done.status, SimulationStatus::Completed);
}

#[tokio::test]
async fn independent_simulations_do_not_interfere() {
    let registry = SimulationRegistry::default();
    let heavy = registry.create(&mixed_request()).await.unwrap();
    let tax_only = registry
        .create(&request(5, 2, 10, vec![OperationSpec::Tax { tax_rate: 0.5 }]))
        .await
        .unwrap();

    let (a, b) = tokio::join!(registry.run(heavy), registry.run(tax_only));
    assert!(a.is_ok());
    assert!(b.is_ok());

    let stats = registry.stats(tax_only).await.unwrap();
    assert_eq!(stats.len(), 3);
    assert!(stats.iter().all(|s| s.total == 50));
    assert_eq!(registry.list().await.len(), 2);
}

#[tokio::test]
async fn custom_histogram_options_recompute() {
    let registry = SimulationRegistry::default();
    let id = registry
        .create(&request(4, 1, 0, vec![OperationSpec::Uniform { resources_added: 8 }]))
        .await
        .unwrap();
    registry.run(id).await.unwrap();

    let options = HistogramOptions {
        bin_count: 4,
        normalization: Normalization::Count,
    };
    let histogram = registry.histogram(id, Some(options)).await.unwrap();
    assert_eq!(histogram.bin_edges.len(), 5);
    // Epoch 0: every node holds 0; epoch 1: every node holds 2.
    assert_eq!(
        histogram.epoch_distributions,
        vec![vec![4.0, 0.0, 0.0, 0.0], vec![0.0, 0.0, 0.0, 4.0]]
    );

    let zero_bins = HistogramOptions {
        bin_count: 0,
        normalization: Normalization::Count,
    };
    assert!(matches!(
        registry.histogram(id, Some(zero_bins)).await,
        Err(RegistryError::InvalidConfiguration { .. })
    ));
}
