//! Node population: the mutable resource holdings of every node.
//!
//! Position in the population is the node's stable identity. Holdings are
//! whole units (`u64`); the running total is maintained incrementally so
//! weighted sampling and conservation checks never rescan the nodes.
//!
//! Tax and expenditure obligations are computed in [`Decimal`]. The
//! whole-unit part of an obligation is settled immediately and the
//! fractional remainder is carried per node into the next obligation of
//! the same kind, so fractions are neither lost nor rounded away.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::EngineError;

/// Which carried-remainder ledger an obligation settles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obligation {
    /// Proportional tax.
    Tax,
    /// Flat expenditure.
    Expenditure,
}

/// The resource state of all nodes of one simulation run.
///
/// Never shared between runs: each execution builds its own population
/// from the configuration and drops it once the snapshots are taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePopulation {
    resources: Vec<u64>,
    total: u64,
    tax_carry: Vec<Decimal>,
    expenditure_carry: Vec<Decimal>,
}

impl NodePopulation {
    /// Create `node_count` nodes each holding `resources_per_node`.
    pub fn new(node_count: usize, resources_per_node: u64) -> Result<Self, EngineError> {
        if node_count == 0 {
            return Err(EngineError::invalid("population needs at least one node"));
        }
        let count = u64::try_from(node_count).map_err(|_overflow| {
            EngineError::ArithmeticOverflow {
                context: "counting nodes",
            }
        })?;
        let total = count
            .checked_mul(resources_per_node)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "seeding initial resources",
            })?;

        Ok(Self {
            resources: vec![resources_per_node; node_count],
            total,
            tax_carry: vec![Decimal::ZERO; node_count],
            expenditure_carry: vec![Decimal::ZERO; node_count],
        })
    }

    /// Build a population from explicit holdings.
    pub fn from_resources(resources: Vec<u64>) -> Result<Self, EngineError> {
        if resources.is_empty() {
            return Err(EngineError::invalid("population needs at least one node"));
        }
        let total = resources
            .iter()
            .try_fold(0_u64, |acc, &r| acc.checked_add(r))
            .ok_or(EngineError::ArithmeticOverflow {
                context: "summing initial resources",
            })?;
        let len = resources.len();
        Ok(Self {
            resources,
            total,
            tax_carry: vec![Decimal::ZERO; len],
            expenditure_carry: vec![Decimal::ZERO; len],
        })
    }

    /// Number of nodes.
    pub const fn len(&self) -> usize {
        self.resources.len()
    }

    /// Always `false`; a population has at least one node.
    pub const fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Sum of all holdings.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Holdings in node order.
    pub fn resources(&self) -> &[u64] {
        &self.resources
    }

    /// Holdings of a single node.
    pub fn get(&self, index: usize) -> Option<u64> {
        self.resources.get(index).copied()
    }

    /// Give `amount` units to the node at `index`.
    pub fn add(&mut self, index: usize, amount: u64) -> Result<(), EngineError> {
        let len = self.resources.len();
        let slot = self
            .resources
            .get_mut(index)
            .ok_or(EngineError::NodeOutOfRange { index, len })?;
        let new_total = self
            .total
            .checked_add(amount)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "adding resources to the population total",
            })?;
        *slot = slot.checked_add(amount).ok_or(EngineError::ArithmeticOverflow {
            context: "adding resources to a node",
        })?;
        self.total = new_total;
        Ok(())
    }

    /// Split `amount` evenly across all nodes.
    ///
    /// The remainder `amount % len` goes one unit each to the
    /// lowest-indexed nodes, so the total grows by exactly `amount`.
    pub fn distribute_evenly(&mut self, amount: u64) -> Result<(), EngineError> {
        let count = u64::try_from(self.resources.len()).map_err(|_overflow| {
            EngineError::ArithmeticOverflow {
                context: "counting nodes",
            }
        })?;
        let share = amount.checked_div(count).ok_or(EngineError::ArithmeticOverflow {
            context: "dividing resources across nodes",
        })?;
        let remainder = amount.checked_rem(count).ok_or(EngineError::ArithmeticOverflow {
            context: "dividing resources across nodes",
        })?;
        let new_total = self
            .total
            .checked_add(amount)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "adding resources to the population total",
            })?;

        let mut extra_left = remainder;
        for slot in &mut self.resources {
            let extra = u64::from(extra_left > 0);
            extra_left = extra_left.saturating_sub(extra);
            let grant = share.saturating_add(extra);
            *slot = slot.checked_add(grant).ok_or(EngineError::ArithmeticOverflow {
                context: "adding resources to a node",
            })?;
        }
        self.total = new_total;
        Ok(())
    }

    /// Settle one obligation against every node and return the units taken.
    ///
    /// `owed` maps a node's current holdings to what it owes this time.
    /// The carried fraction of the same obligation kind is added, the
    /// whole-unit part is taken (never more than the node holds), and
    /// the fractional part is carried forward. A shortfall beyond the
    /// node's holdings is forgiven.
    pub fn settle<F>(&mut self, kind: Obligation, mut owed: F) -> Result<u64, EngineError>
    where
        F: FnMut(u64) -> Result<Decimal, EngineError>,
    {
        let carries = match kind {
            Obligation::Tax => &mut self.tax_carry,
            Obligation::Expenditure => &mut self.expenditure_carry,
        };

        let mut collected: u64 = 0;
        for (slot, carry) in self.resources.iter_mut().zip(carries.iter_mut()) {
            let obligation = owed(*slot)?
                .checked_add(*carry)
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "accumulating an obligation",
                })?;
            let due = obligation.floor();
            let take = due.to_u64().unwrap_or(u64::MAX).min(*slot);

            *carry = obligation
                .checked_sub(due)
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "carrying a fractional obligation",
                })?;
            *slot = slot.saturating_sub(take);
            collected = collected
                .checked_add(take)
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "summing collected obligations",
                })?;
        }

        self.total = self.total.saturating_sub(collected);
        Ok(collected)
    }

    /// Fractional remainders currently carried for `kind`, in node order.
    pub fn carried(&self, kind: Obligation) -> &[Decimal] {
        match kind {
            Obligation::Tax => &self.tax_carry,
            Obligation::Expenditure => &self.expenditure_carry,
        }
    }

    /// Immutable copy of the holdings at the end of `epoch`.
    pub fn snapshot(&self, epoch: u32) -> EpochSnapshot {
        EpochSnapshot {
            epoch,
            total: self.total,
            resources: self.resources.clone(),
        }
    }
}

/// Holdings of every node at one epoch boundary.
///
/// Snapshot 0 is the state before any operation ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSnapshot {
    /// Epoch index.
    pub epoch: u32,
    /// Sum of `resources`.
    pub total: u64,
    /// Holdings in node order.
    pub resources: Vec<u64>,
}

impl EpochSnapshot {
    /// Smallest holding.
    pub fn min(&self) -> u64 {
        self.resources.iter().copied().min().unwrap_or(0)
    }

    /// Largest holding.
    pub fn max(&self) -> u64 {
        self.resources.iter().copied().max().unwrap_or(0)
    }

    /// Mean holding.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.resources.is_empty() {
            return 0.0;
        }
        self.total as f64 / self.resources.len() as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn new_population_is_seeded_uniformly() {
        let pop = NodePopulation::new(5, 10).unwrap();
        assert_eq!(pop.len(), 5);
        assert_eq!(pop.total(), 50);
        assert!(pop.resources().iter().all(|&r| r == 10));
    }

    #[test]
    fn empty_population_is_rejected() {
        let result = NodePopulation::new(0, 10);
        assert!(matches!(result, Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn seeding_overflow_is_reported() {
        let result = NodePopulation::new(3, u64::MAX);
        assert!(matches!(result, Err(EngineError::ArithmeticOverflow { .. })));
    }

    #[test]
    fn add_updates_node_and_total() {
        let mut pop = NodePopulation::new(3, 1).unwrap();
        assert!(pop.add(1, 4).is_ok());
        assert_eq!(pop.get(1), Some(5));
        assert_eq!(pop.total(), 7);
    }

    #[test]
    fn add_out_of_range_fails_without_side_effects() {
        let mut pop = NodePopulation::new(2, 1).unwrap();
        let result = pop.add(9, 4);
        assert_eq!(result, Err(EngineError::NodeOutOfRange { index: 9, len: 2 }));
        assert_eq!(pop.total(), 2);
    }

    #[test]
    fn even_distribution_assigns_remainder_to_lowest_indices() {
        // Three nodes of 10 receive 10 more: 14, 13, 13.
        let mut pop = NodePopulation::new(3, 10).unwrap();
        assert!(pop.distribute_evenly(10).is_ok());
        assert_eq!(pop.resources(), &[14, 13, 13]);
        assert_eq!(pop.total(), 40);
    }

    #[test]
    fn settle_takes_whole_units_and_carries_fractions() {
        let mut pop = NodePopulation::from_resources(vec![3, 10]).unwrap();
        // Half of 3 is 1.5: take 1, carry 0.5. Half of 10 is 5: take 5.
        let collected = pop.settle(Obligation::Tax, |r| Ok(Decimal::from(r) * dec!(0.5)));
        assert_eq!(collected, Ok(6));
        assert_eq!(pop.resources(), &[2, 5]);
        assert_eq!(pop.total(), 7);
        assert_eq!(pop.carried(Obligation::Tax), &[dec!(0.5), dec!(0)]);

        // Next round: 2 * 0.5 + 0.5 = 1.5 -> take 1, carry 0.5 again.
        // 5 * 0.5 = 2.5 -> take 2, carry 0.5.
        let collected = pop.settle(Obligation::Tax, |r| Ok(Decimal::from(r) * dec!(0.5)));
        assert_eq!(collected, Ok(3));
        assert_eq!(pop.resources(), &[1, 3]);
        assert_eq!(pop.total(), 4);
        assert_eq!(pop.carried(Obligation::Tax), &[dec!(0.5), dec!(0.5)]);
    }

    #[test]
    fn settle_never_takes_more_than_held() {
        let mut pop = NodePopulation::from_resources(vec![2, 7]).unwrap();
        let collected = pop.settle(Obligation::Expenditure, |_| Ok(dec!(5)));
        assert_eq!(collected, Ok(7));
        assert_eq!(pop.resources(), &[0, 2]);
        assert_eq!(pop.carried(Obligation::Expenditure), &[dec!(0), dec!(0)]);
    }

    #[test]
    fn carries_are_kept_per_obligation_kind() {
        let mut pop = NodePopulation::from_resources(vec![10]).unwrap();
        let _ = pop.settle(Obligation::Expenditure, |_| Ok(dec!(0.25)));
        assert_eq!(pop.carried(Obligation::Expenditure), &[dec!(0.25)]);
        assert_eq!(pop.carried(Obligation::Tax), &[dec!(0)]);
    }

    #[test]
    fn snapshot_statistics() {
        let pop = NodePopulation::from_resources(vec![1, 4, 7]).unwrap();
        let snap = pop.snapshot(3);
        assert_eq!(snap.epoch, 3);
        assert_eq!(snap.total, 12);
        assert_eq!(snap.min(), 1);
        assert_eq!(snap.max(), 7);
        assert!((snap.mean() - 4.0).abs() < f64::EPSILON);
    }
}
