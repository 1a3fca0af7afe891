//! Operation executor: the closed set of per-epoch population transitions.
//!
//! Every variant of [`Operation`] is handled exhaustively in
//! [`Operation::apply`]; adding a new kind of operation is a compile-time
//! change. Given the same population, parameters, and RNG state, `apply`
//! produces the same result.
//!
//! | Variant | Effect | Total after |
//! |---------|--------|-------------|
//! | `PreferentialAttachment` | units drawn proportional to `resources + ε` | `+ resources_added` |
//! | `RandomAttachment` | units drawn uniformly | `+ resources_added` |
//! | `UniformAttachment` | even split, remainder to lowest indices | `+ resources_added` |
//! | `SpecificAttachment` | all units to `target_node` | `+ resources_added` |
//! | `Tax` | `tax_rate * resources` collected, redistributed evenly | unchanged |
//! | `Expenditure` | flat deduction, floored at zero | `- expenditure_incurred` |

use rand::Rng;
use rgrr_types::OperationSpec;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::trace;

use crate::config::ConfigLimits;
use crate::error::EngineError;
use crate::population::{NodePopulation, Obligation};
use crate::sampler::{EPSILON_DENOMINATOR, WeightTree};

/// One validated operation with its numeric parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Allocate units one at a time, each to a node drawn with
    /// probability proportional to `resources + ε`.
    PreferentialAttachment {
        /// Units allocated per application.
        resources_added: u64,
    },
    /// Allocate units one at a time, each to a uniformly drawn node.
    RandomAttachment {
        /// Units allocated per application.
        resources_added: u64,
    },
    /// Split units evenly across nodes.
    UniformAttachment {
        /// Units allocated per application.
        resources_added: u64,
    },
    /// Give all units to one node.
    SpecificAttachment {
        /// Units allocated per application.
        resources_added: u64,
        /// Receiving node index.
        target_node: usize,
    },
    /// Collect `tax_rate * resources` from every node and redistribute
    /// the collected total evenly.
    Tax {
        /// Rate in `[0, 1]`.
        tax_rate: Decimal,
    },
    /// Deduct a flat amount from every node, never below zero.
    Expenditure {
        /// Non-negative per-node amount.
        expenditure: Decimal,
    },
}

/// Resource flows produced by one or more operation applications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    /// Units added by attachment operations.
    pub resources_added: u64,
    /// Units collected by tax (and redistributed in full).
    pub tax_collected: u64,
    /// Units removed by expenditure.
    pub expenditure_incurred: u64,
}

impl OperationOutcome {
    /// Accumulate another outcome into this one.
    pub fn absorb(&mut self, other: Self) -> Result<(), EngineError> {
        let overflow = EngineError::ArithmeticOverflow {
            context: "accumulating epoch flows",
        };
        self.resources_added = self
            .resources_added
            .checked_add(other.resources_added)
            .ok_or_else(|| overflow.clone())?;
        self.tax_collected = self
            .tax_collected
            .checked_add(other.tax_collected)
            .ok_or_else(|| overflow.clone())?;
        self.expenditure_incurred = self
            .expenditure_incurred
            .checked_add(other.expenditure_incurred)
            .ok_or(overflow)?;
        Ok(())
    }
}

impl Operation {
    /// Validate a wire operation and convert it to its engine form.
    pub fn from_spec(spec: &OperationSpec, limits: &ConfigLimits) -> Result<Self, EngineError> {
        let op = match *spec {
            OperationSpec::Preferential { resources_added } => Self::PreferentialAttachment {
                resources_added: units("preferential", resources_added)?,
            },
            OperationSpec::Random { resources_added } => Self::RandomAttachment {
                resources_added: units("random", resources_added)?,
            },
            OperationSpec::Uniform { resources_added } => Self::UniformAttachment {
                resources_added: units("uniform", resources_added)?,
            },
            OperationSpec::Specific {
                resources_added,
                target_node,
            } => Self::SpecificAttachment {
                resources_added: units("specific", resources_added)?,
                target_node: usize::try_from(target_node).map_err(|_out_of_range| {
                    EngineError::invalid(format!(
                        "specific: target_node must be a node index, got {target_node}"
                    ))
                })?,
            },
            OperationSpec::Tax { tax_rate } => Self::Tax {
                tax_rate: decimal("tax_rate", tax_rate)?,
            },
            OperationSpec::Expenditure { expenditure } => Self::Expenditure {
                expenditure: decimal("expenditure", expenditure)?,
            },
        };
        op.validate(limits)?;
        Ok(op)
    }

    /// Wire form of this operation.
    pub fn to_spec(&self) -> OperationSpec {
        match *self {
            Self::PreferentialAttachment { resources_added } => OperationSpec::Preferential {
                resources_added: i64::try_from(resources_added).unwrap_or(i64::MAX),
            },
            Self::RandomAttachment { resources_added } => OperationSpec::Random {
                resources_added: i64::try_from(resources_added).unwrap_or(i64::MAX),
            },
            Self::UniformAttachment { resources_added } => OperationSpec::Uniform {
                resources_added: i64::try_from(resources_added).unwrap_or(i64::MAX),
            },
            Self::SpecificAttachment {
                resources_added,
                target_node,
            } => OperationSpec::Specific {
                resources_added: i64::try_from(resources_added).unwrap_or(i64::MAX),
                target_node: i64::try_from(target_node).unwrap_or(i64::MAX),
            },
            Self::Tax { tax_rate } => OperationSpec::Tax {
                tax_rate: tax_rate.to_f64().unwrap_or(0.0),
            },
            Self::Expenditure { expenditure } => OperationSpec::Expenditure {
                expenditure: expenditure.to_f64().unwrap_or(0.0),
            },
        }
    }

    /// Wire tag of this operation.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PreferentialAttachment { .. } => "preferential",
            Self::RandomAttachment { .. } => "random",
            Self::UniformAttachment { .. } => "uniform",
            Self::SpecificAttachment { .. } => "specific",
            Self::Tax { .. } => "tax",
            Self::Expenditure { .. } => "expenditure",
        }
    }

    /// Units this operation adds per application, if it is an attachment.
    pub const fn resources_added(&self) -> Option<u64> {
        match *self {
            Self::PreferentialAttachment { resources_added }
            | Self::RandomAttachment { resources_added }
            | Self::UniformAttachment { resources_added }
            | Self::SpecificAttachment {
                resources_added, ..
            } => Some(resources_added),
            Self::Tax { .. } | Self::Expenditure { .. } => None,
        }
    }

    /// Random draws one application makes: one per unit for preferential
    /// and random attachment, none otherwise.
    pub const fn unit_draws(&self) -> u64 {
        match *self {
            Self::PreferentialAttachment { resources_added }
            | Self::RandomAttachment { resources_added } => resources_added,
            _ => 0,
        }
    }

    /// Check the parameter constraints and the configured limits.
    pub fn validate(&self, limits: &ConfigLimits) -> Result<(), EngineError> {
        self.check_parameters()?;
        match self.resources_added() {
            Some(resources_added) if resources_added > limits.max_resources_per_operation => {
                Err(EngineError::invalid(format!(
                    "{}: resources_added {resources_added} exceeds the limit of {}",
                    self.name(),
                    limits.max_resources_per_operation
                )))
            }
            _ => Ok(()),
        }
    }

    /// Check the parameter constraints that hold regardless of limits.
    pub fn check_parameters(&self) -> Result<(), EngineError> {
        match *self {
            Self::PreferentialAttachment { .. }
            | Self::RandomAttachment { .. }
            | Self::UniformAttachment { .. }
            | Self::SpecificAttachment { .. } => {}
            Self::Tax { tax_rate } => {
                if tax_rate < Decimal::ZERO || tax_rate > Decimal::ONE {
                    return Err(EngineError::invalid(format!(
                        "tax: tax_rate must be within [0, 1], got {tax_rate}"
                    )));
                }
            }
            Self::Expenditure { expenditure } => {
                if expenditure < Decimal::ZERO {
                    return Err(EngineError::invalid(format!(
                        "expenditure: expenditure must be non-negative, got {expenditure}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply this operation to `population`, drawing randomness from `rng`.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        population: &mut NodePopulation,
        rng: &mut R,
    ) -> Result<OperationOutcome, EngineError> {
        if population.is_empty() {
            return Err(EngineError::EmptyPopulation);
        }

        let outcome = match *self {
            Self::PreferentialAttachment { resources_added } => {
                attach_preferentially(population, resources_added, rng)?;
                OperationOutcome {
                    resources_added,
                    ..OperationOutcome::default()
                }
            }
            Self::RandomAttachment { resources_added } => {
                attach_randomly(population, resources_added, rng)?;
                OperationOutcome {
                    resources_added,
                    ..OperationOutcome::default()
                }
            }
            Self::UniformAttachment { resources_added } => {
                population.distribute_evenly(resources_added)?;
                OperationOutcome {
                    resources_added,
                    ..OperationOutcome::default()
                }
            }
            Self::SpecificAttachment {
                resources_added,
                target_node,
            } => {
                population.add(target_node, resources_added)?;
                OperationOutcome {
                    resources_added,
                    ..OperationOutcome::default()
                }
            }
            Self::Tax { tax_rate } => {
                let collected = collect_tax(population, tax_rate)?;
                OperationOutcome {
                    tax_collected: collected,
                    ..OperationOutcome::default()
                }
            }
            Self::Expenditure { expenditure } => {
                let incurred = if expenditure.is_zero() {
                    0
                } else {
                    population.settle(Obligation::Expenditure, |_| Ok(expenditure))?
                };
                OperationOutcome {
                    expenditure_incurred: incurred,
                    ..OperationOutcome::default()
                }
            }
        };

        trace!(
            operation = self.name(),
            total = population.total(),
            "Operation applied"
        );
        Ok(outcome)
    }
}

fn attach_preferentially<R: Rng + ?Sized>(
    population: &mut NodePopulation,
    resources_added: u64,
    rng: &mut R,
) -> Result<(), EngineError> {
    if resources_added == 0 {
        return Ok(());
    }
    let mut tree = WeightTree::from_resources(population.resources())?;
    for _ in 0..resources_added {
        let index = tree.sample(rng).ok_or(EngineError::EmptyPopulation)?;
        population.add(index, 1)?;
        tree.add(index, EPSILON_DENOMINATOR)?;
    }
    Ok(())
}

fn attach_randomly<R: Rng + ?Sized>(
    population: &mut NodePopulation,
    resources_added: u64,
    rng: &mut R,
) -> Result<(), EngineError> {
    let len = population.len();
    for _ in 0..resources_added {
        let index = rng.random_range(0..len);
        population.add(index, 1)?;
    }
    Ok(())
}

/// Collect tax from every node and hand the whole collection back evenly.
fn collect_tax(population: &mut NodePopulation, tax_rate: Decimal) -> Result<u64, EngineError> {
    if tax_rate.is_zero() {
        return Ok(0);
    }
    let collected = population.settle(Obligation::Tax, |resources| {
        Decimal::from(resources)
            .checked_mul(tax_rate)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "computing a tax obligation",
            })
    })?;
    population.distribute_evenly(collected)?;
    Ok(collected)
}

fn units(operation: &str, value: i64) -> Result<u64, EngineError> {
    u64::try_from(value).map_err(|_negative| {
        EngineError::invalid(format!(
            "{operation}: resources_added must be non-negative, got {value}"
        ))
    })
}

fn decimal(field: &str, value: f64) -> Result<Decimal, EngineError> {
    if !value.is_finite() {
        return Err(EngineError::invalid(format!(
            "{field} must be a finite number, got {value}"
        )));
    }
    Decimal::try_from(value).map_err(|e| {
        EngineError::invalid(format!("{field} is not representable ({value}): {e}"))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rust_decimal_macros::dec;

    use super::*;

    fn limits() -> ConfigLimits {
        ConfigLimits::default()
    }

    fn population(resources: &[u64]) -> NodePopulation {
        NodePopulation::from_resources(resources.to_vec()).unwrap()
    }

    #[test]
    fn preferential_adds_exact_total() {
        let mut pop = population(&[10, 10, 10]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let op = Operation::PreferentialAttachment { resources_added: 30 };
        let outcome = op.apply(&mut pop, &mut rng);
        assert_eq!(
            outcome,
            Ok(OperationOutcome {
                resources_added: 30,
                ..OperationOutcome::default()
            })
        );
        assert_eq!(pop.total(), 60);
        assert_eq!(pop.resources().iter().sum::<u64>(), 60);
    }

    #[test]
    fn preferential_on_all_zero_population_still_allocates() {
        let mut pop = population(&[0, 0, 0]);
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let op = Operation::PreferentialAttachment { resources_added: 3 };
        assert!(op.apply(&mut pop, &mut rng).is_ok());
        assert_eq!(pop.total(), 3);
    }

    #[test]
    fn preferential_favours_the_rich() {
        let mut pop = population(&[1_000, 0, 0, 0]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let op = Operation::PreferentialAttachment { resources_added: 1_000 };
        assert!(op.apply(&mut pop, &mut rng).is_ok());
        // The rich node's weight dwarfs the three ε-weighted empty nodes.
        assert!(pop.get(0).unwrap_or(0) > 1_990, "got {:?}", pop.resources());
    }

    #[test]
    fn preferential_is_deterministic_for_a_seed() {
        let op = Operation::PreferentialAttachment { resources_added: 500 };
        let run = |seed| {
            let mut pop = population(&[1, 2, 3, 4, 5]);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let _ = op.apply(&mut pop, &mut rng);
            pop.resources().to_vec()
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn random_adds_exact_total() {
        let mut pop = population(&[0, 0]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let op = Operation::RandomAttachment { resources_added: 17 };
        assert!(op.apply(&mut pop, &mut rng).is_ok());
        assert_eq!(pop.total(), 17);
    }

    #[test]
    fn uniform_splits_with_remainder_first() {
        let mut pop = population(&[10, 10, 10]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::UniformAttachment { resources_added: 10 };
        assert!(op.apply(&mut pop, &mut rng).is_ok());
        assert_eq!(pop.resources(), &[14, 13, 13]);
    }

    #[test]
    fn specific_gives_everything_to_the_target() {
        let mut pop = population(&[1, 1, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::SpecificAttachment {
            resources_added: 9,
            target_node: 2,
        };
        let outcome = op.apply(&mut pop, &mut rng);
        assert_eq!(outcome.map(|o| o.resources_added), Ok(9));
        assert_eq!(pop.resources(), &[1, 1, 10]);
        assert_eq!(pop.total(), 12);
    }

    #[test]
    fn specific_with_missing_target_fails() {
        let mut pop = population(&[1, 1]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::SpecificAttachment {
            resources_added: 1,
            target_node: 2,
        };
        assert_eq!(
            op.apply(&mut pop, &mut rng),
            Err(EngineError::NodeOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(pop.total(), 2);
    }

    #[test]
    fn draws_are_counted_for_sampled_attachment_only() {
        assert_eq!(
            Operation::PreferentialAttachment { resources_added: 7 }.unit_draws(),
            7
        );
        assert_eq!(Operation::RandomAttachment { resources_added: 4 }.unit_draws(), 4);
        assert_eq!(Operation::UniformAttachment { resources_added: 4 }.unit_draws(), 0);
        assert_eq!(
            Operation::SpecificAttachment {
                resources_added: 4,
                target_node: 0
            }
            .unit_draws(),
            0
        );
    }

    #[test]
    fn tax_conserves_total_and_flattens() {
        let mut pop = population(&[0, 10, 90]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Tax { tax_rate: dec!(0.5) };
        let outcome = op.apply(&mut pop, &mut rng);
        // Collected 0 + 5 + 45 = 50, redistributed as 17, 17, 16.
        assert_eq!(outcome.map(|o| o.tax_collected), Ok(50));
        assert_eq!(pop.resources(), &[17, 22, 61]);
        assert_eq!(pop.total(), 100);
    }

    #[test]
    fn full_tax_equalizes() {
        let mut pop = population(&[0, 0, 12]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Tax { tax_rate: Decimal::ONE };
        assert!(op.apply(&mut pop, &mut rng).is_ok());
        assert_eq!(pop.resources(), &[4, 4, 4]);
    }

    #[test]
    fn zero_tax_is_a_no_op() {
        let mut pop = population(&[3, 5]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Tax { tax_rate: Decimal::ZERO };
        assert_eq!(op.apply(&mut pop, &mut rng), Ok(OperationOutcome::default()));
        assert_eq!(pop.resources(), &[3, 5]);
    }

    #[test]
    fn expenditure_is_floored_at_zero() {
        let mut pop = population(&[10, 10, 10]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Expenditure { expenditure: dec!(15) };
        let outcome = op.apply(&mut pop, &mut rng);
        assert_eq!(outcome.map(|o| o.expenditure_incurred), Ok(30));
        assert_eq!(pop.resources(), &[0, 0, 0]);
    }

    #[test]
    fn expenditure_deducts_flat_amount() {
        let mut pop = population(&[10, 10, 10]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Expenditure { expenditure: dec!(5) };
        let outcome = op.apply(&mut pop, &mut rng);
        assert_eq!(outcome.map(|o| o.expenditure_incurred), Ok(15));
        assert_eq!(pop.resources(), &[5, 5, 5]);
    }

    #[test]
    fn fractional_expenditure_accumulates_across_applications() {
        let mut pop = population(&[10]);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let op = Operation::Expenditure { expenditure: dec!(0.5) };
        let first = op.apply(&mut pop, &mut rng);
        let second = op.apply(&mut pop, &mut rng);
        assert_eq!(first.map(|o| o.expenditure_incurred), Ok(0));
        assert_eq!(second.map(|o| o.expenditure_incurred), Ok(1));
        assert_eq!(pop.resources(), &[9]);
    }

    #[test]
    fn spec_conversion_validates_ranges() {
        let l = limits();
        assert!(Operation::from_spec(&OperationSpec::Tax { tax_rate: 1.5 }, &l).is_err());
        assert!(Operation::from_spec(&OperationSpec::Tax { tax_rate: -0.1 }, &l).is_err());
        assert!(Operation::from_spec(&OperationSpec::Tax { tax_rate: f64::NAN }, &l).is_err());
        assert!(
            Operation::from_spec(&OperationSpec::Expenditure { expenditure: -1.0 }, &l).is_err()
        );
        assert!(
            Operation::from_spec(&OperationSpec::Preferential { resources_added: -3 }, &l)
                .is_err()
        );
        assert!(
            Operation::from_spec(
                &OperationSpec::Specific {
                    resources_added: 1,
                    target_node: -1
                },
                &l
            )
            .is_err()
        );
        let too_many = i64::try_from(l.max_resources_per_operation)
            .unwrap_or(i64::MAX)
            .saturating_add(1);
        assert!(
            Operation::from_spec(
                &OperationSpec::Uniform {
                    resources_added: too_many
                },
                &l
            )
            .is_err()
        );
    }

    #[test]
    fn spec_conversion_round_trips() {
        let l = limits();
        let specs = [
            OperationSpec::Preferential { resources_added: 3 },
            OperationSpec::Random { resources_added: 4 },
            OperationSpec::Uniform { resources_added: 5 },
            OperationSpec::Specific {
                resources_added: 6,
                target_node: 1,
            },
            OperationSpec::Tax { tax_rate: 0.5 },
            OperationSpec::Expenditure { expenditure: 2.0 },
        ];
        for spec in &specs {
            let op = Operation::from_spec(spec, &l);
            assert_eq!(op.map(|o| o.to_spec()).as_ref(), Ok(spec));
        }
    }

    #[test]
    fn outcomes_accumulate() {
        let mut total = OperationOutcome::default();
        let step = OperationOutcome {
            resources_added: 2,
            tax_collected: 3,
            expenditure_incurred: 4,
        };
        assert!(total.absorb(step).is_ok());
        assert!(total.absorb(step).is_ok());
        assert_eq!(total.tax_collected, 6);
        let huge = OperationOutcome {
            resources_added: u64::MAX,
            ..OperationOutcome::default()
        };
        assert!(total.absorb(huge).is_err());
    }
}
