//! Per-execution classification and per-benchmark aggregation
//!
//! An execution is classified from its segment structure alone:
//!
//! - `flat`: the steady state spans the whole run
//! - `warmup`: the run settles at a level no slower than its initial segment
//! - `slowdown`: the steady state is more than `delta` slower than the initial segment
//! - `no steady state`: the steady state starts too close to the end of the run
//!   (only when a minimum steady-state window is configured)
//! - `could not classify`: there was not enough usable data to segment
//!
//! Sibling executions of one benchmark are then combined into a single
//! reported classification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::changepoint::SegmentSequence;
use crate::error::StatsError;

/// Classification of a single process execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "flat")]
    Flat,
    #[serde(rename = "warmup")]
    Warmup,
    #[serde(rename = "slowdown")]
    Slowdown,
    #[serde(rename = "no steady state")]
    NoSteadyState,
    #[serde(rename = "could not classify")]
    CouldNotClassify,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Flat,
        Classification::Warmup,
        Classification::Slowdown,
        Classification::NoSteadyState,
        Classification::CouldNotClassify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Flat => "flat",
            Classification::Warmup => "warmup",
            Classification::Slowdown => "slowdown",
            Classification::NoSteadyState => "no steady state",
            Classification::CouldNotClassify => "could not classify",
        }
    }

    /// Whether this execution contributes steady-state data to a summary.
    pub fn has_steady_state(&self) -> bool {
        matches!(
            self,
            Classification::Flat | Classification::Warmup | Classification::Slowdown
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| StatsError::UnsupportedFormat(format!("unknown classification '{}'", s)))
    }
}

/// Classification reported for a whole benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReportedClassification {
    /// Every execution agreed
    Consistent(Classification),
    /// Executions were a mix of `flat` and `warmup`
    GoodInconsistent,
    /// Any other mix
    BadInconsistent,
}

impl ReportedClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportedClassification::Consistent(class) => class.as_str(),
            ReportedClassification::GoodInconsistent => "good inconsistent",
            ReportedClassification::BadInconsistent => "bad inconsistent",
        }
    }

    pub fn is_inconsistent(&self) -> bool {
        !matches!(self, ReportedClassification::Consistent(_))
    }
}

impl fmt::Display for ReportedClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportedClassification {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good inconsistent" => Ok(ReportedClassification::GoodInconsistent),
            "bad inconsistent" => Ok(ReportedClassification::BadInconsistent),
            other => other.parse().map(ReportedClassification::Consistent),
        }
    }
}

impl TryFrom<String> for ReportedClassification {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ReportedClassification> for String {
    fn from(class: ReportedClassification) -> Self {
        class.as_str().to_string()
    }
}

/// How many executions fell into each category.
///
/// Every category is present, with zero counts where nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationCounts(BTreeMap<Classification, usize>);

impl ClassificationCounts {
    pub fn from_classifications(classifications: &[Classification]) -> Self {
        let mut counts: BTreeMap<Classification, usize> =
            Classification::ALL.into_iter().map(|class| (class, 0)).collect();
        for class in classifications {
            *counts.entry(*class).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, class: Classification) -> usize {
        self.0.get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Non-zero categories, in category order.
    pub fn non_zero(&self) -> impl Iterator<Item = (Classification, usize)> + '_ {
        self.0
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(&class, &count)| (class, count))
    }
}

/// Classify one execution from its segments.
///
/// `delta` is absolute (already resolved from a percentage if needed).
/// Once the steady region is known, its level is compared with the initial
/// segment's mean: more than `delta` slower is a slowdown, anything else a
/// warmup. A non-zero `steady_state_window` additionally requires the steady
/// state to last that many iterations; `0` disables the check.
///
/// # Examples
///
/// ```
/// use steady_state::changepoint::SegmentSequence;
/// use steady_state::classify::{classify, Classification};
/// use steady_state::stats::OutlierSet;
///
/// let mut timings = vec![2.0; 100];
/// timings.extend(vec![1.0; 100]);
/// let segments =
///     SegmentSequence::from_changepoints(&timings, &OutlierSet::default(), vec![99]).unwrap();
///
/// assert_eq!(classify(&segments, 0.1, 0), Classification::Warmup);
/// assert_eq!(classify(&segments, 0.1, 500), Classification::NoSteadyState);
/// assert_eq!(classify(&segments, 2.0, 500), Classification::Flat);
/// ```
pub fn classify(
    segments: &SegmentSequence,
    delta: f64,
    steady_state_window: usize,
) -> Classification {
    let steady = segments.steady_region(delta);
    if steady.first_segment == 0 {
        return Classification::Flat;
    }
    if segments.sequence_len() - steady.start < steady_state_window {
        return Classification::NoSteadyState;
    }
    let initial = segments.segments()[0].mean;
    if steady.mean(segments) > initial + delta {
        Classification::Slowdown
    } else {
        Classification::Warmup
    }
}

/// Combine sibling executions' classifications; `None` if there are none.
///
/// # Examples
///
/// ```
/// use steady_state::classify::{aggregate, Classification::*, ReportedClassification};
///
/// assert_eq!(aggregate(&[Warmup, Warmup]), Some(ReportedClassification::Consistent(Warmup)));
/// assert_eq!(aggregate(&[Flat, Warmup]), Some(ReportedClassification::GoodInconsistent));
/// assert_eq!(aggregate(&[Flat, Slowdown]), Some(ReportedClassification::BadInconsistent));
/// ```
pub fn aggregate(classifications: &[Classification]) -> Option<ReportedClassification> {
    let (&first, rest) = classifications.split_first()?;
    if rest.iter().all(|&class| class == first) {
        return Some(ReportedClassification::Consistent(first));
    }
    let flat_or_warmup = classifications
        .iter()
        .all(|class| matches!(class, Classification::Flat | Classification::Warmup));
    if flat_or_warmup {
        Some(ReportedClassification::GoodInconsistent)
    } else {
        Some(ReportedClassification::BadInconsistent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::OutlierSet;
    use pretty_assertions::assert_eq;

    fn steps(levels: &[(f64, usize)]) -> SegmentSequence {
        let mut timings = Vec::new();
        let mut changepoints = Vec::new();
        for &(level, count) in levels {
            if !timings.is_empty() {
                changepoints.push(timings.len() - 1);
            }
            timings.extend(std::iter::repeat(level).take(count));
        }
        SegmentSequence::from_changepoints(&timings, &OutlierSet::default(), changepoints)
            .unwrap()
    }

    #[test]
    fn test_single_segment_is_flat() {
        assert_eq!(classify(&steps(&[(1.0, 10)]), 0.001, 0), Classification::Flat);
    }

    #[test]
    fn test_merged_back_to_first_segment_is_flat() {
        let segments = steps(&[(1.0, 300), (1.05, 300), (1.0, 300)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::Flat);
    }

    #[test]
    fn test_warmup() {
        let segments = steps(&[(10.0, 100), (1.0, 600)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::Warmup);
    }

    #[test]
    fn test_slowdown() {
        let segments = steps(&[(1.0, 100), (10.0, 600)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::Slowdown);
    }

    #[test]
    fn test_compares_steady_level_with_initial_segment() {
        // A faster middle segment does not matter: the run ends faster than it began.
        let segments = steps(&[(10.0, 100), (0.5, 100), (1.0, 600)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::Warmup);

        // Slower than the start, even though a middle segment was slower still.
        let segments = steps(&[(1.0, 100), (20.0, 100), (5.0, 600)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::Slowdown);
    }

    #[test]
    fn test_steady_level_within_delta_of_start_is_warmup() {
        let segments = steps(&[(1.0, 100), (5.0, 100), (1.0, 600)]);
        assert_eq!(segments.steady_region(0.1).first_segment, 2);
        assert_eq!(classify(&segments, 0.1, 0), Classification::Warmup);
    }

    #[test]
    fn test_short_steady_state_is_no_steady_state() {
        let segments = steps(&[(10.0, 100), (1.0, 100)]);
        assert_eq!(classify(&segments, 0.1, 500), Classification::NoSteadyState);
        assert_eq!(classify(&segments, 0.1, 100), Classification::Warmup);
    }

    #[test]
    fn test_zero_window_disables_duration_check() {
        let segments = steps(&[(10.0, 100), (1.0, 2)]);
        assert_eq!(classify(&segments, 0.1, 0), Classification::Warmup);
    }

    #[test]
    fn test_aggregate_consistent() {
        assert_eq!(
            aggregate(&[Classification::Slowdown; 3]),
            Some(ReportedClassification::Consistent(Classification::Slowdown))
        );
    }

    #[test]
    fn test_aggregate_inconsistent() {
        use Classification::*;
        assert_eq!(
            aggregate(&[Flat, Warmup, Flat]),
            Some(ReportedClassification::GoodInconsistent)
        );
        assert_eq!(
            aggregate(&[Warmup, NoSteadyState]),
            Some(ReportedClassification::BadInconsistent)
        );
        assert_eq!(
            aggregate(&[Flat, CouldNotClassify]),
            Some(ReportedClassification::BadInconsistent)
        );
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn test_counts_are_zero_filled() {
        let counts = ClassificationCounts::from_classifications(&[
            Classification::Warmup,
            Classification::Warmup,
            Classification::Flat,
        ]);
        assert_eq!(counts.get(Classification::Warmup), 2);
        assert_eq!(counts.get(Classification::Flat), 1);
        assert_eq!(counts.get(Classification::Slowdown), 0);
        assert_eq!(counts.total(), 3);
        assert_eq!(
            counts.non_zero().collect::<Vec<_>>(),
            vec![(Classification::Flat, 1), (Classification::Warmup, 2)]
        );

        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["no steady state"], 0);
        assert_eq!(json["warmup"], 2);
    }

    #[test]
    fn test_string_forms() {
        for class in Classification::ALL {
            assert_eq!(class.to_string().parse::<Classification>(), Ok(class));
            let json = serde_json::to_string(&class).unwrap();
            assert_eq!(json, format!("\"{}\"", class));
        }
        let reported: ReportedClassification =
            serde_json::from_str("\"good inconsistent\"").unwrap();
        assert_eq!(reported, ReportedClassification::GoodInconsistent);
        let reported: ReportedClassification = serde_json::from_str("\"flat\"").unwrap();
        assert_eq!(reported, ReportedClassification::Consistent(Classification::Flat));
        assert!(serde_json::from_str::<ReportedClassification>("\"fast\"").is_err());
    }
}
