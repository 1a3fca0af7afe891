//! Resource conservation checks for executed epochs.
//!
//! Attachment operations are the only source of resources and expenditure
//! is the only sink. Tax moves resources between nodes and must net to
//! zero. For each epoch `e > 0` the check is:
//!
//! ```text
//! total(e) == total(e - 1) + resources_added(e) - expenditure_incurred(e)
//! total(e) == sum(resources(e))
//! ```
//!
//! The population maintains both sides incrementally, so the check passes
//! by construction for a correct engine. A violation produces a
//! [`ConservationAnomaly`].

use crate::operation::OperationOutcome;
use crate::population::EpochSnapshot;

/// Details of a failed conservation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConservationAnomaly {
    /// Epoch whose snapshot failed the check.
    pub epoch: u32,
    /// Total implied by the previous epoch and this epoch's flows.
    pub expected: Option<u64>,
    /// Total recorded in the snapshot.
    pub recorded: u64,
    /// Human-readable description.
    pub message: String,
}

/// The result of a conservation check for a single epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Flows and totals agree.
    Balanced,
    /// The recorded total disagrees with the flows or the node resources.
    Anomaly(ConservationAnomaly),
}

impl ConservationResult {
    /// Returns `true` if the check passed.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Verify that `current` follows from `previous` and the epoch's flows.
pub fn verify_epoch(
    previous: &EpochSnapshot,
    current: &EpochSnapshot,
    flows: &OperationOutcome,
) -> ConservationResult {
    let epoch = current.epoch;

    let summed = current
        .resources
        .iter()
        .try_fold(0_u64, |acc, &r| acc.checked_add(r));
    if summed != Some(current.total) {
        return ConservationResult::Anomaly(ConservationAnomaly {
            epoch,
            expected: summed,
            recorded: current.total,
            message: format!(
                "CONSERVATION_ANOMALY at epoch {epoch}: node resources sum to {summed:?}, recorded total is {}",
                current.total
            ),
        });
    }

    let expected = previous
        .total
        .checked_add(flows.resources_added)
        .and_then(|t| t.checked_sub(flows.expenditure_incurred));
    if expected == Some(current.total) {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(ConservationAnomaly {
            epoch,
            expected,
            recorded: current.total,
            message: format!(
                "CONSERVATION_ANOMALY at epoch {epoch}: expected total {expected:?} from flows, recorded {}",
                current.total
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(epoch: u32, resources: &[u64]) -> EpochSnapshot {
        EpochSnapshot {
            epoch,
            total: resources.iter().sum(),
            resources: resources.to_vec(),
        }
    }

    #[test]
    fn balanced_when_flows_explain_the_change() {
        let before = snapshot(0, &[5, 5]);
        let after = snapshot(1, &[9, 3]);
        let flows = OperationOutcome {
            resources_added: 4,
            tax_collected: 2,
            expenditure_incurred: 2,
        };
        assert!(verify_epoch(&before, &after, &flows).is_balanced());
    }

    #[test]
    fn unexplained_growth_is_an_anomaly() {
        let before = snapshot(0, &[5, 5]);
        let after = snapshot(1, &[6, 5]);
        let result = verify_epoch(&before, &after, &OperationOutcome::default());
        let ConservationResult::Anomaly(anomaly) = result else {
            panic!("expected anomaly");
        };
        assert_eq!(anomaly.epoch, 1);
        assert_eq!(anomaly.expected, Some(10));
        assert_eq!(anomaly.recorded, 11);
        assert!(anomaly.message.contains("CONSERVATION_ANOMALY"));
    }

    #[test]
    fn mismatched_total_is_an_anomaly() {
        let before = snapshot(0, &[5, 5]);
        let mut after = snapshot(1, &[5, 5]);
        after.total = 12;
        let result = verify_epoch(&before, &after, &OperationOutcome::default());
        assert!(!result.is_balanced());
    }
}
