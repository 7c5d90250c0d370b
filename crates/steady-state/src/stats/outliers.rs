//! Outlier detection for run sequences.
//!
//! Outliers are found with a sliding-window variant of Tukey's rule: a point
//! is an outlier if it lies outside `median ± 3 * (p90 - p10)` of the window
//! centred on it. Median and percentiles resist contamination, so a burst of
//! outliers does not hide itself by inflating the band.
//!
//! Outliers are then split by provenance: an outlier reported at the same
//! index by enough sibling process executions is "common" (likely caused by
//! the benchmark itself, e.g. periodic GC), otherwise it is "unique".

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::percentiles::{median, percentile, sorted};
use super::window::{is_short_start_window, window};
use crate::error::StatsError;

/// Width multiplier applied to the p10..p90 spread.
pub const TUKEY_FACTOR: f64 = 3.0;

/// Find all outliers in `sequence` using a sliding window of `window_size`.
///
/// Indices whose window is cut short by the start of the sequence are never
/// flagged. Returns indices in ascending order.
///
/// # Errors
///
/// Returns [`StatsError::InvalidConfig`] if `window_size < 2`.
///
/// # Examples
///
/// ```
/// use steady_state::stats::outliers::detect;
///
/// let mut data = vec![1.0; 50];
/// data[30] = 100.0;
/// assert_eq!(detect(&data, 10).unwrap(), vec![30]);
/// ```
pub fn detect(sequence: &[f64], window_size: usize) -> Result<Vec<usize>, StatsError> {
    if window_size < 2 {
        return Err(StatsError::InvalidConfig(format!(
            "window size must be at least 2, got {}",
            window_size
        )));
    }

    let len = sequence.len();
    let mut outliers = Vec::new();
    for (index, &datum) in sequence.iter().enumerate() {
        if is_short_start_window(index, len, window_size) {
            continue;
        }
        let window_sorted = sorted(window(sequence, index, window_size));
        let window_median = median(&window_sorted)?;
        let band = TUKEY_FACTOR
            * (percentile(&window_sorted, 90.0)? - percentile(&window_sorted, 10.0)?);
        if datum > window_median + band || datum < window_median - band {
            outliers.push(index);
        }
    }
    Ok(outliers)
}

/// Split each execution's outliers into (common, unique).
///
/// For execution `i`, an outlier `o` is common if at least `threshold` other
/// executions (`j != i`) also report `o`. The returned vectors are aligned
/// with `all_outliers` and preserve each execution's input order.
///
/// # Examples
///
/// ```
/// use steady_state::stats::outliers::partition;
///
/// let all = vec![vec![3, 42], vec![42], vec![]];
/// let (common, unique) = partition(&all, 1);
/// assert_eq!(common, vec![vec![42], vec![42], vec![]]);
/// assert_eq!(unique, vec![vec![3], vec![], vec![]]);
/// ```
pub fn partition(
    all_outliers: &[Vec<usize>],
    threshold: usize,
) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    let lookup: Vec<HashSet<usize>> = all_outliers
        .iter()
        .map(|outliers| outliers.iter().copied().collect())
        .collect();

    let mut common = Vec::with_capacity(all_outliers.len());
    let mut unique = Vec::with_capacity(all_outliers.len());
    for (index, outliers) in all_outliers.iter().enumerate() {
        let (common_exec, unique_exec): (Vec<usize>, Vec<usize>) =
            outliers.iter().partition(|outlier| {
                let shared = lookup
                    .iter()
                    .enumerate()
                    .filter(|(other, set)| *other != index && set.contains(outlier))
                    .count();
                shared >= threshold
            });
        common.push(common_exec);
        unique.push(unique_exec);
    }
    (common, unique)
}

/// Outliers of one process execution, partitioned by provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierSet {
    /// Every outlier index, ascending
    pub all: Vec<usize>,
    /// Outliers shared with enough sibling executions
    pub common: Vec<usize>,
    /// Outliers seen only in this execution (or too few siblings)
    pub unique: Vec<usize>,
}

impl OutlierSet {
    /// Build one [`OutlierSet`] per execution from their `all` lists.
    pub fn for_executions(all_outliers: Vec<Vec<usize>>, threshold: usize) -> Vec<Self> {
        let (common, unique) = partition(&all_outliers, threshold);
        all_outliers
            .into_iter()
            .zip(common)
            .zip(unique)
            .map(|((all, common), unique)| OutlierSet {
                all,
                common,
                unique,
            })
            .collect()
    }

    /// Check if any outliers were detected.
    pub fn has_outliers(&self) -> bool {
        !self.all.is_empty()
    }

    /// Whether `index` was flagged. Relies on `all` being sorted.
    pub fn is_outlier(&self, index: usize) -> bool {
        self.all.binary_search(&index).is_ok()
    }

    /// `(index, value)` pairs of `sequence` that are not outliers, in order.
    pub fn clean_values<'a>(
        &'a self,
        sequence: &'a [f64],
    ) -> impl Iterator<Item = (usize, f64)> + 'a {
        sequence
            .iter()
            .copied()
            .enumerate()
            .filter(move |(index, _)| !self.is_outlier(*index))
    }
}
