//! Outlier accounting
//!
//! Two views over the outliers of one or more results bundles:
//!
//! - [`OutlierTally`]: total outliers for each window size and common-outlier
//!   threshold, used to pick sensible detection parameters
//! - [`OutlierSummary`]: outliers per benchmark, VM and language variant

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::bundle::ResultsBundle;
use crate::error::StatsError;
use crate::key::ExecutionKey;
use crate::stats::outliers::{detect, partition};

/// Window sizes tallied when none are given.
pub const DEFAULT_TALLY_WINDOWS: [usize; 6] = [25, 50, 100, 200, 300, 400];

/// Outlier totals for one window size and threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierCounts {
    pub all_outliers: usize,
    pub common_outliers: usize,
    pub unique_outliers: usize,
}

impl OutlierCounts {
    fn add(&mut self, all: &[Vec<usize>], common: &[Vec<usize>], unique: &[Vec<usize>]) {
        self.all_outliers += all.iter().map(Vec::len).sum::<usize>();
        self.common_outliers += common.iter().map(Vec::len).sum::<usize>();
        self.unique_outliers += unique.iter().map(Vec::len).sum::<usize>();
    }
}

/// Outlier totals by window size, then threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutlierTally(pub BTreeMap<usize, BTreeMap<usize, OutlierCounts>>);

impl OutlierTally {
    pub fn get(&self, window_size: usize, threshold: usize) -> Option<&OutlierCounts> {
        self.0.get(&window_size)?.get(&threshold)
    }
}

/// Count outliers in `bundles` for every window size and every threshold
/// from 1 to one less than the number of process executions.
///
/// The number of executions is taken from the first analysable benchmark.
///
/// # Errors
///
/// Returns [`StatsError::InvalidConfig`] if a window size is below 2.
#[instrument(skip_all, fields(count = bundles.len()))]
pub fn tally_by_threshold(
    bundles: &[ResultsBundle],
    windows: &[usize],
) -> Result<OutlierTally, StatsError> {
    let n_execs = bundles
        .iter()
        .flat_map(|bundle| {
            bundle
                .analysable_keys()
                .into_iter()
                .map(move |key| bundle.wallclock_times[key].len())
        })
        .next()
        .unwrap_or(0);
    info!(
        "Assuming {} process executions per benchmark in all bundles",
        n_execs
    );

    let per_window = windows
        .par_iter()
        .map(|&window_size| {
            let mut by_threshold: BTreeMap<usize, OutlierCounts> =
                (1..n_execs).map(|t| (t, OutlierCounts::default())).collect();
            for bundle in bundles {
                for key in bundle.analysable_keys() {
                    let all = bundle.wallclock_times[key]
                        .iter()
                        .map(|timings| detect(timings, window_size))
                        .collect::<Result<Vec<_>, _>>()?;
                    for (&threshold, counts) in by_threshold.iter_mut() {
                        let (common, unique) = partition(&all, threshold);
                        counts.add(&all, &common, &unique);
                    }
                }
            }
            Ok::<_, StatsError>((window_size, by_threshold))
        })
        .collect::<Result<BTreeMap<_, _>, StatsError>>()?;

    Ok(OutlierTally(per_window))
}

/// Outlier counts by benchmark, VM and language variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub benchmarks: BTreeMap<String, usize>,
    pub vms: BTreeMap<String, usize>,
    pub variants: BTreeMap<String, usize>,
}

impl OutlierSummary {
    /// Sum the cached `all_outliers` of annotated bundles.
    ///
    /// Every key is listed, with zero for benchmarks that were skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::InvalidKey`] for a malformed key.
    pub fn from_bundles(bundles: &[ResultsBundle]) -> Result<Self, StatsError> {
        let mut summary = OutlierSummary::default();
        for bundle in bundles {
            for key in bundle.wallclock_times.keys() {
                let parsed: ExecutionKey = key.parse()?;
                let count: usize = bundle
                    .all_outliers
                    .get(key)
                    .map_or(0, |executions| executions.iter().map(Vec::len).sum());
                *summary.benchmarks.entry(parsed.benchmark).or_insert(0) += count;
                *summary.vms.entry(parsed.vm).or_insert(0) += count;
                *summary.variants.entry(parsed.variant).or_insert(0) += count;
            }
        }
        Ok(summary)
    }
}
