//! Histogram aggregation over a run's snapshots.
//!
//! All epochs share one set of bin edges spanning the global minimum and
//! maximum across every snapshot, so distributions from different epochs
//! are directly comparable. Bins are half-open `[e_i, e_{i+1})` except the
//! last, which also includes its right edge.

use rgrr_types::{HistogramResult, Normalization};
use serde::Deserialize;

use crate::error::EngineError;
use crate::population::EpochSnapshot;

/// Default number of bins.
pub const DEFAULT_BIN_COUNT: usize = 20;

/// Binning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HistogramOptions {
    /// Number of bins, at least 1.
    #[serde(default = "default_bin_count")]
    pub bin_count: usize,
    /// How bin values are scaled.
    #[serde(default)]
    pub normalization: Normalization,
}

const fn default_bin_count() -> usize {
    DEFAULT_BIN_COUNT
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            normalization: Normalization::default(),
        }
    }
}

/// Bin every snapshot against shared edges.
///
/// When every value across all snapshots is identical there is a single
/// bin `[v - 0.5, v + 0.5]` regardless of `bin_count`.
///
/// # Errors
///
/// Returns [`EngineError::EmptySnapshots`] if there is nothing to bin and
/// [`EngineError::InvalidConfiguration`] if `bin_count` is zero.
pub fn bin(
    snapshots: &[EpochSnapshot],
    options: &HistogramOptions,
) -> Result<HistogramResult, EngineError> {
    if options.bin_count == 0 {
        return Err(EngineError::invalid("bin_count must be at least 1"));
    }

    let values = || snapshots.iter().flat_map(|s| s.resources.iter().copied());
    let (Some(low), Some(high)) = (values().min(), values().max()) else {
        return Err(EngineError::EmptySnapshots);
    };

    let bin_edges = edges(low, high, options.bin_count);
    let epoch_distributions = snapshots
        .iter()
        .map(|snapshot| distribution(snapshot, &bin_edges, options.normalization))
        .collect();

    Ok(HistogramResult {
        bin_edges,
        epoch_distributions,
    })
}

/// `bin_count + 1` ascending edges from `low` to `high`.
#[allow(clippy::cast_precision_loss)]
fn edges(low: u64, high: u64, bin_count: usize) -> Vec<f64> {
    if low == high {
        let v = low as f64;
        return vec![v - 0.5, v + 0.5];
    }
    let (first, last) = (low as f64, high as f64);
    let width = (last - first) / bin_count as f64;
    let mut edges: Vec<f64> = (0..bin_count)
        .map(|i| width.mul_add(i as f64, first))
        .collect();
    edges.push(last);
    edges
}

/// Index of the bin containing `value`.
fn bin_index(edges: &[f64], value: f64) -> usize {
    let bins = edges.len().saturating_sub(1);
    edges
        .partition_point(|&edge| edge <= value)
        .saturating_sub(1)
        .min(bins.saturating_sub(1))
}

#[allow(clippy::cast_precision_loss)]
fn distribution(snapshot: &EpochSnapshot, edges: &[f64], normalization: Normalization) -> Vec<f64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0_u64; bins];
    for &value in &snapshot.resources {
        if let Some(count) = counts.get_mut(bin_index(edges, value as f64)) {
            *count = count.saturating_add(1);
        }
    }

    match normalization {
        Normalization::Count => counts.iter().map(|&c| c as f64).collect(),
        Normalization::Density => {
            let n = snapshot.resources.len() as f64;
            counts
                .iter()
                .zip(edges.windows(2))
                .map(|(&c, pair)| match *pair {
                    [left, right] if n > 0.0 => c as f64 / (n * (right - left)),
                    _ => 0.0,
                })
                .collect()
        }
    }
}
