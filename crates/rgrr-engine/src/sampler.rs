//! Weighted node sampling for preferential attachment.
//!
//! [`WeightTree`] is a Fenwick (binary indexed) tree over integer node
//! weights. Point updates and weighted draws are both `O(log n)`, which
//! keeps allocating many units across large populations cheap.
//!
//! Weights are `resources * EPSILON_DENOMINATOR + 1`: every node carries
//! a bias of `ε = 1 / EPSILON_DENOMINATOR` on top of its holdings, so a
//! node with nothing can still be picked and an all-zero population is
//! sampled uniformly. Integer weights keep the draw exact and portable.

use rand::Rng;

use crate::error::EngineError;

/// Scale factor between one resource unit and the sampling bias `ε`.
pub const EPSILON_DENOMINATOR: u64 = 1_000;

/// Sampling weight of a node holding `resources` units.
pub fn node_weight(resources: u64) -> Result<u64, EngineError> {
    resources
        .checked_mul(EPSILON_DENOMINATOR)
        .and_then(|w| w.checked_add(1))
        .ok_or(EngineError::ArithmeticOverflow {
            context: "computing a sampling weight",
        })
}

/// Fenwick tree of per-node sampling weights.
#[derive(Debug, Clone)]
pub struct WeightTree {
    /// 1-based partial sums; `tree[0]` is unused.
    tree: Vec<u64>,
    total: u64,
}

impl WeightTree {
    /// Build a tree from per-node weights in `O(n)`.
    pub fn from_weights(weights: &[u64]) -> Result<Self, EngineError> {
        let len = weights.len();
        let mut tree = Vec::with_capacity(len.saturating_add(1));
        tree.push(0);
        tree.extend_from_slice(weights);

        // Linear construction: push each partial sum to its parent.
        for i in 1..=len {
            let parent = i.saturating_add(lowest_bit(i));
            if parent <= len {
                let child = tree.get(i).copied().unwrap_or(0);
                if let Some(slot) = tree.get_mut(parent) {
                    *slot = slot.checked_add(child).ok_or(EngineError::ArithmeticOverflow {
                        context: "building the sampling tree",
                    })?;
                }
            }
        }

        let total = weights
            .iter()
            .try_fold(0_u64, |acc, &w| acc.checked_add(w))
            .ok_or(EngineError::ArithmeticOverflow {
                context: "summing sampling weights",
            })?;

        Ok(Self { tree, total })
    }

    /// Build the tree for a population's current holdings.
    pub fn from_resources(resources: &[u64]) -> Result<Self, EngineError> {
        let weights = resources
            .iter()
            .map(|&r| node_weight(r))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_weights(&weights)
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all weights.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Increase the weight of node `index` by `delta`.
    pub fn add(&mut self, index: usize, delta: u64) -> Result<(), EngineError> {
        let len = self.len();
        if index >= len {
            return Err(EngineError::NodeOutOfRange { index, len });
        }
        self.total = self
            .total
            .checked_add(delta)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "updating the sampling total",
            })?;

        let mut i = index.saturating_add(1);
        while i <= len {
            if let Some(slot) = self.tree.get_mut(i) {
                *slot = slot.checked_add(delta).ok_or(EngineError::ArithmeticOverflow {
                    context: "updating the sampling tree",
                })?;
            }
            i = i.saturating_add(lowest_bit(i));
        }
        Ok(())
    }

    /// Sum of the weights of nodes `0..=index`.
    pub fn prefix_sum(&self, index: usize) -> u64 {
        let mut i = index.saturating_add(1).min(self.len());
        let mut sum: u64 = 0;
        while i > 0 {
            sum = sum.saturating_add(self.tree.get(i).copied().unwrap_or(0));
            i = i.saturating_sub(lowest_bit(i));
        }
        sum
    }

    /// Index of the node owning position `target` in `[0, total)`.
    ///
    /// That is the smallest `i` with `prefix_sum(i) > target`.
    pub fn find(&self, target: u64) -> Option<usize> {
        if target >= self.total {
            return None;
        }
        let len = self.len();
        let mut pos: usize = 0;
        let mut remaining = target;
        let mut step = highest_power_of_two_at_most(len);

        while step > 0 {
            let next = pos.saturating_add(step);
            if next <= len {
                let partial = self.tree.get(next).copied().unwrap_or(u64::MAX);
                if partial <= remaining {
                    pos = next;
                    remaining = remaining.saturating_sub(partial);
                }
            }
            step >>= 1;
        }
        // `pos` is the 1-based index of the last node whose prefix sum
        // does not exceed the target, which is the 0-based answer.
        Some(pos)
    }

    /// Draw a node index with probability proportional to its weight.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        if self.total == 0 {
            return None;
        }
        let target = rng.random_range(0..self.total);
        self.find(target)
    }
}

const fn lowest_bit(i: usize) -> usize {
    i & i.wrapping_neg()
}

const fn highest_power_of_two_at_most(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        1_usize << (usize::BITS - 1 - n.leading_zeros())
    }
}
