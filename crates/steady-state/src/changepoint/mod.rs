//! Changepoints, segments, and steady-state determination
//!
//! A run sequence is split into segments of homogeneous performance by a
//! [`ChangepointDetector`]. Outliers are excluded from the values the detector
//! sees and from every segment statistic, but keep their index positions so
//! segment boundaries refer to real iteration numbers.
//!
//! The steady state is found by walking backwards from the final segment and
//! merging every segment whose `mean ± variance` band overlaps the final
//! segment's band (widened to at least `± delta`).
//!
//! # Example
//!
//! ```
//! use steady_state::changepoint::{analyse, Pelt};
//! use steady_state::stats::OutlierSet;
//!
//! let mut timings = vec![10.0; 100];
//! timings.extend(vec![1.0; 100]);
//!
//! let segments = analyse(&timings, &OutlierSet::default(), &Pelt::default()).unwrap();
//! assert_eq!(segments.changepoints(), &[99]);
//!
//! let steady = segments.steady_region(1.0);
//! assert_eq!(steady.start, 100);
//! ```

mod pelt;

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::stats::summation;
use crate::stats::OutlierSet;

pub use pelt::{Pelt, DEFAULT_MIN_SEGMENT_LENGTH, DEFAULT_PENALTY_MULTIPLIER, VARIANCE_FLOOR};

/// Offline changepoint search over outlier-free values.
///
/// Implementations return the **last** index of every segment except the
/// final one: strictly increasing, each `< values.len() - 1`.
pub trait ChangepointDetector: Send + Sync {
    fn find_changepoints(&self, values: &[f64]) -> Vec<usize>;
}

/// A contiguous `[start, end)` range of a run sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    /// Mean of the non-outlier values in the range
    pub mean: f64,
    /// Population variance of the non-outlier values in the range
    pub variance: f64,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this segment's `mean ± variance` band touches `[lower, upper]`.
    pub fn overlaps(&self, lower: f64, upper: f64) -> bool {
        self.mean + self.variance >= lower && self.mean - self.variance <= upper
    }
}

/// Ordered segments covering a whole run sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSequence {
    changepoints: Vec<usize>,
    segments: Vec<Segment>,
}

/// The trailing, merged steady-state part of a [`SegmentSequence`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteadyRegion {
    /// Index (into the segment list) of the earliest merged segment
    pub first_segment: usize,
    /// Iteration index where the steady state begins
    pub start: usize,
    /// Lower edge of the band segments were merged against
    pub lower: f64,
    /// Upper edge of the band segments were merged against
    pub upper: f64,
}

impl SteadyRegion {
    /// Number of segments merged into the steady state.
    pub fn segment_count(&self, segments: &SegmentSequence) -> usize {
        segments.len() - self.first_segment
    }

    /// Steady-state level: the mean of the merged segments' means.
    pub fn mean(&self, segments: &SegmentSequence) -> f64 {
        let merged = &segments.segments()[self.first_segment..];
        summation::fsum_iter(merged.iter().map(|s| s.mean)) / merged.len() as f64
    }
}

/// Segment `sequence`, ignoring `outliers`, with `detector`.
///
/// # Errors
///
/// * [`StatsError::InsufficientData`] - fewer than two non-outlier values
/// * [`StatsError::NoSteadyData`] - the final segment is made only of outliers
pub fn analyse(
    sequence: &[f64],
    outliers: &OutlierSet,
    detector: &dyn ChangepointDetector,
) -> Result<SegmentSequence, StatsError> {
    let clean: Vec<(usize, f64)> = outliers.clean_values(sequence).collect();
    if clean.len() < 2 {
        return Err(StatsError::InsufficientData {
            usable: clean.len(),
        });
    }

    let values: Vec<f64> = clean.iter().map(|&(_, value)| value).collect();
    let changepoints: Vec<usize> = detector
        .find_changepoints(&values)
        .into_iter()
        .map(|cleaned| {
            assert!(
                cleaned + 1 < clean.len(),
                "changepoint {} out of range for {} values",
                cleaned,
                clean.len()
            );
            clean[cleaned].0
        })
        .collect();

    SegmentSequence::from_changepoints(sequence, outliers, changepoints)
}

impl SegmentSequence {
    /// Rebuild segments from known changepoints (e.g. cached in a results bundle).
    ///
    /// # Panics
    ///
    /// If `changepoints` is not strictly increasing or points past the end of
    /// `sequence`; such input means the segmentation contract was broken.
    pub fn from_changepoints(
        sequence: &[f64],
        outliers: &OutlierSet,
        changepoints: Vec<usize>,
    ) -> Result<Self, StatsError> {
        assert!(
            changepoints.windows(2).all(|w| w[0] < w[1]),
            "changepoints must be strictly increasing: {:?}",
            changepoints
        );
        assert!(
            changepoints.last().map_or(true, |&c| c + 1 < sequence.len()),
            "changepoints must leave a final segment: {:?} for length {}",
            changepoints,
            sequence.len()
        );

        let mut bounds = Vec::with_capacity(changepoints.len() + 1);
        let mut start = 0;
        for &cp in &changepoints {
            bounds.push((start, cp + 1));
            start = cp + 1;
        }
        bounds.push((start, sequence.len()));

        let last = bounds.len() - 1;
        let mut segments = Vec::with_capacity(bounds.len());
        for (position, (start, end)) in bounds.into_iter().enumerate() {
            let values: Vec<f64> = (start..end)
                .filter(|&i| !outliers.is_outlier(i))
                .map(|i| sequence[i])
                .collect();
            let (mean, variance) = match (summation::mean(&values), summation::variance(&values)) {
                (Some(mean), Some(variance)) => (mean, variance),
                _ if position == last => return Err(StatsError::NoSteadyData),
                _ => return Err(StatsError::InsufficientData { usable: 0 }),
            };
            segments.push(Segment {
                start,
                end,
                mean,
                variance,
            });
        }

        Ok(Self {
            changepoints,
            segments,
        })
    }

    pub fn changepoints(&self) -> &[usize] {
        &self.changepoints
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Length of the run sequence the segments cover.
    pub fn sequence_len(&self) -> usize {
        self.segments.last().map_or(0, |s| s.end)
    }

    pub fn means(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.mean).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.segments.iter().map(|s| s.variance).collect()
    }

    /// Smallest segment mean, i.e. the fastest segment.
    pub fn fastest_mean(&self) -> f64 {
        self.segments
            .iter()
            .map(|s| s.mean)
            .fold(f64::INFINITY, f64::min)
    }

    /// Merge trailing segments equivalent to the final one.
    ///
    /// `delta` is an absolute time; percentage deltas must be resolved by the
    /// caller first.
    pub fn steady_region(&self, delta: f64) -> SteadyRegion {
        let last_index = self.segments.len() - 1;
        let last = &self.segments[last_index];
        let lower = (last.mean - last.variance).min(last.mean - delta);
        let upper = (last.mean + last.variance).max(last.mean + delta);

        let first_segment = self.segments[..last_index]
            .iter()
            .rposition(|segment| !segment.overlaps(lower, upper))
            .map_or(0, |diverging| diverging + 1);

        SteadyRegion {
            first_segment,
            start: self.segments[first_segment].start,
            lower,
            upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Detector returning fixed changepoints, for exercising the segment logic.
    struct Fixed(Vec<usize>);

    impl ChangepointDetector for Fixed {
        fn find_changepoints(&self, _values: &[f64]) -> Vec<usize> {
            self.0.clone()
        }
    }

    fn steps(levels: &[(f64, usize)]) -> Vec<f64> {
        levels
            .iter()
            .flat_map(|&(level, count)| std::iter::repeat(level).take(count))
            .collect()
    }

    #[test]
    fn test_no_changepoints_is_one_segment() {
        let data = vec![1.0; 10];
        let segments = analyse(&data, &OutlierSet::default(), &Pelt::default()).unwrap();
        assert!(segments.changepoints().is_empty());
        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments.segments()[0],
            Segment {
                start: 0,
                end: 10,
                mean: 1.0,
                variance: 0.0
            }
        );
    }

    #[test]
    fn test_outliers_excluded_from_statistics() {
        let data = vec![1.0, 1.0, 50.0, 1.0, 1.0, 1.0];
        let outliers = OutlierSet {
            all: vec![2],
            common: vec![],
            unique: vec![2],
        };
        let segments = analyse(&data, &outliers, &Fixed(vec![])).unwrap();
        assert_eq!(segments.segments()[0].mean, 1.0);
        assert_eq!(segments.segments()[0].end, 6);
    }

    #[test]
    fn test_changepoints_map_back_through_outliers() {
        let data = vec![5.0, 5.0, 99.0, 5.0, 1.0, 1.0, 1.0];
        let outliers = OutlierSet {
            all: vec![2],
            common: vec![],
            unique: vec![2],
        };
        // Cleaned index 2 is the original index 3.
        let segments = analyse(&data, &outliers, &Fixed(vec![2])).unwrap();
        assert_eq!(segments.changepoints(), &[3]);
        assert_eq!(segments.segments()[0].start, 0);
        assert_eq!(segments.segments()[0].end, 4);
        assert_eq!(segments.segments()[1].start, 4);
        assert_eq!(segments.segments()[1].mean, 1.0);
    }

    #[test]
    fn test_insufficient_data() {
        let outliers = OutlierSet {
            all: vec![1, 2],
            common: vec![],
            unique: vec![1, 2],
        };
        assert_eq!(
            analyse(&[1.0, 2.0, 3.0], &outliers, &Pelt::default()),
            Err(StatsError::InsufficientData { usable: 1 })
        );
    }

    #[test]
    fn test_final_segment_of_outliers() {
        let data = vec![1.0, 1.0, 1.0, 9.0, 9.0];
        let outliers = OutlierSet {
            all: vec![3, 4],
            common: vec![],
            unique: vec![3, 4],
        };
        assert_eq!(
            SegmentSequence::from_changepoints(&data, &outliers, vec![2]),
            Err(StatsError::NoSteadyData)
        );
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn test_overlapping_changepoints_panic() {
        let data = vec![1.0; 10];
        let _ = SegmentSequence::from_changepoints(&data, &OutlierSet::default(), vec![5, 3]);
    }

    #[test]
    fn test_steady_region_last_segment_only() {
        let data = steps(&[(10.0, 100), (1.0, 100)]);
        let segments =
            SegmentSequence::from_changepoints(&data, &OutlierSet::default(), vec![99]).unwrap();
        let steady = segments.steady_region(1.0);
        assert_eq!(steady.first_segment, 1);
        assert_eq!(steady.start, 100);
        assert_eq!(steady.lower, 0.0);
        assert_eq!(steady.upper, 2.0);
        assert_eq!(steady.segment_count(&segments), 1);
    }

    #[test]
    fn test_steady_region_merges_equivalent_segments() {
        let data = steps(&[(5.0, 50), (1.1, 50), (1.0, 50)]);
        let segments =
            SegmentSequence::from_changepoints(&data, &OutlierSet::default(), vec![49, 99])
                .unwrap();
        let steady = segments.steady_region(0.2);
        assert_eq!(steady.first_segment, 1);
        assert_eq!(steady.start, 50);
        assert_eq!(steady.segment_count(&segments), 2);
    }

    #[test]
    fn test_steady_region_stops_at_first_gap() {
        // The first segment matches the steady level but is cut off by the
        // diverging middle segment.
        let data = steps(&[(1.0, 50), (5.0, 50), (1.0, 50)]);
        let segments =
            SegmentSequence::from_changepoints(&data, &OutlierSet::default(), vec![49, 99])
                .unwrap();
        assert_eq!(segments.steady_region(0.1).first_segment, 2);
    }

    #[test]
    fn test_fastest_mean() {
        let data = steps(&[(3.0, 10), (1.5, 10), (2.0, 10)]);
        let segments =
            SegmentSequence::from_changepoints(&data, &OutlierSet::default(), vec![9, 19])
                .unwrap();
        assert_eq!(segments.fastest_mean(), 1.5);
        assert_eq!(segments.means(), vec![3.0, 1.5, 2.0]);
        assert_eq!(segments.variances(), vec![0.0, 0.0, 0.0]);
    }

    proptest! {
        /// Property: the steady region always contains the last segment and
        /// starts no later as delta grows.
        #[test]
        fn steady_start_monotone_in_delta(
            levels in prop::collection::vec((0.1f64..10.0, 2usize..20), 1..8),
            d1 in 0.0f64..5.0,
            d2 in 0.0f64..5.0,
        ) {
            let data = steps(&levels);
            let mut changepoints = Vec::new();
            let mut end = 0;
            for &(_, count) in &levels[..levels.len() - 1] {
                end += count;
                changepoints.push(end - 1);
            }
            let segments = SegmentSequence::from_changepoints(
                &data,
                &OutlierSet::default(),
                changepoints,
            ).unwrap();

            let (small, large) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            let narrow = segments.steady_region(small);
            let wide = segments.steady_region(large);
            prop_assert!(narrow.first_segment < segments.len());
            prop_assert!(wide.start <= narrow.start);
            prop_assert!(narrow.start <= segments.segments()[segments.len() - 1].start);
        }
    }
}
