//! Bootstrap confidence intervals for steady-state performance
//!
//! This is a cluster bootstrap: each process execution contributes the same
//! number of resamples, and a resample draws (with replacement) as many
//! values from each of the execution's steady segments as the segment holds.
//! The reported value is the median of all resampled means, with a
//! symmetric confidence interval half-width.
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use steady_state::bootstrap::{bootstrap_steady_perf, Quality};
//!
//! let pexecs = vec![vec![vec![2.0, 2.0, 2.0]]];
//! let mut rng = ChaCha8Rng::seed_from_u64(0);
//! let estimate = bootstrap_steady_perf(&pexecs, 0.99, Quality::Low, &mut rng).unwrap();
//! assert_eq!(estimate.median, 2.0);
//! assert_eq!(estimate.ci, 0.0);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::confidence_ppm;
use crate::error::StatsError;
use crate::stats::summation::{fsum, fsum_iter};

/// Total resamples drawn at [`Quality::High`].
pub const HIGH_QUALITY_RESAMPLES: usize = 100_000;

/// Total resamples drawn at [`Quality::Low`].
pub const LOW_QUALITY_RESAMPLES: usize = 10_000;

const PPM: u128 = 1_000_000;

/// Bootstrap resampling quality.
///
/// `High` materialises every resample and sums it exactly; `Low` draws ten
/// times fewer resamples and keeps a running sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Quality {
    #[default]
    High,
    Low,
}

impl Quality {
    /// Total number of resamples to aim for.
    pub fn target_resamples(&self) -> usize {
        match self {
            Quality::High => HIGH_QUALITY_RESAMPLES,
            Quality::Low => LOW_QUALITY_RESAMPLES,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::High => f.write_str("HIGH"),
            Quality::Low => f.write_str("LOW"),
        }
    }
}

impl FromStr for Quality {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("high") {
            Ok(Quality::High)
        } else if s.eq_ignore_ascii_case("low") {
            Ok(Quality::Low)
        } else {
            Err(StatsError::InvalidConfig(format!(
                "unknown quality level '{}' (expected HIGH or LOW)",
                s
            )))
        }
    }
}

impl TryFrom<String> for Quality {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Quality> for String {
    fn from(quality: Quality) -> Self {
        quality.to_string()
    }
}

/// Result of bootstrapping one benchmark's steady-state data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapEstimate {
    /// Median of the resampled means
    pub median: f64,
    /// Half-width of the confidence interval: mean of `upper - median` and `median - lower`
    pub ci: f64,
    /// Lower bound of the confidence interval
    pub lower: f64,
    /// Upper bound of the confidence interval
    pub upper: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BootstrapError {
    #[error("No steady-state data to bootstrap")]
    NoData,

    #[error("Confidence level must be strictly between 0 and 1, got {0}")]
    InvalidConfidence(f64),
}

/// Number of resamples each execution contributes so the total reaches `target`.
///
/// # Examples
///
/// ```
/// use steady_state::bootstrap::resamples_per_pexec;
///
/// assert_eq!(resamples_per_pexec(100_000, 30), 3334);
/// assert_eq!(resamples_per_pexec(10_000, 1), 10_001);
/// ```
pub fn resamples_per_pexec(target: usize, n_pexecs: usize) -> usize {
    target / n_pexecs.max(1) + 1
}

/// Bootstrap the steady-state performance of one benchmark.
///
/// `segments_per_pexec[p][s]` holds the non-outlier timings of steady segment
/// `s` of process execution `p`.
///
/// # Errors
///
/// * [`BootstrapError::NoData`] - no executions, or an execution with no timings
/// * [`BootstrapError::InvalidConfidence`] - `confidence` outside `(0, 1)`
pub fn bootstrap_steady_perf<R: Rng>(
    segments_per_pexec: &[Vec<Vec<f64>>],
    confidence: f64,
    quality: Quality,
    rng: &mut R,
) -> Result<BootstrapEstimate, BootstrapError> {
    if segments_per_pexec.is_empty()
        || segments_per_pexec
            .iter()
            .any(|segments| segments.iter().all(Vec::is_empty))
    {
        return Err(BootstrapError::NoData);
    }
    let ppm =
        confidence_ppm(confidence).map_err(|_| BootstrapError::InvalidConfidence(confidence))?;

    Ok(resample_interval(
        segments_per_pexec,
        ppm,
        quality,
        quality.target_resamples(),
        rng,
    ))
}

fn resample_interval<R: Rng>(
    segments_per_pexec: &[Vec<Vec<f64>>],
    confidence_ppm: u64,
    quality: Quality,
    target: usize,
    rng: &mut R,
) -> BootstrapEstimate {
    let resamples = resamples_per_pexec(target, segments_per_pexec.len());
    let mut means = match quality {
        Quality::High => resample_materialised(segments_per_pexec, resamples, rng),
        Quality::Low => resample_running(segments_per_pexec, resamples, rng),
    };
    means.sort_by(f64::total_cmp);

    interval(&means, confidence_ppm)
}

fn resample_materialised<R: Rng>(
    segments_per_pexec: &[Vec<Vec<f64>>],
    resamples: usize,
    rng: &mut R,
) -> Vec<f64> {
    let mut means = Vec::with_capacity(resamples * segments_per_pexec.len());
    let mut sample = Vec::new();
    for segments in segments_per_pexec {
        for _ in 0..resamples {
            sample.clear();
            for segment in segments {
                sample.extend((0..segment.len()).map(|_| segment[rng.gen_range(0..segment.len())]));
            }
            means.push(fsum(&sample) / sample.len() as f64);
        }
    }
    means
}

fn resample_running<R: Rng>(
    segments_per_pexec: &[Vec<Vec<f64>>],
    resamples: usize,
    rng: &mut R,
) -> Vec<f64> {
    let mut means = Vec::with_capacity(resamples * segments_per_pexec.len());
    for segments in segments_per_pexec {
        for _ in 0..resamples {
            let mut sum = 0.0;
            let mut count = 0usize;
            for segment in segments {
                count += segment.len();
                for _ in 0..segment.len() {
                    sum += segment[rng.gen_range(0..segment.len())];
                }
            }
            means.push(sum / count as f64);
        }
    }
    means
}

/// Median and confidence interval of sorted, non-empty `means`.
///
/// With `e = (1 - confidence) / 2` and `N` means, the bounds are the values at
/// `floor(e * N)` and `ceil((1 - e) * N) - 1`, computed in integers from the
/// confidence in parts per million.
fn interval(means: &[f64], confidence_ppm: u64) -> BootstrapEstimate {
    let n = means.len();
    let confidence = u128::from(confidence_ppm);
    let total = n as u128;

    let lower_index = ((PPM - confidence) * total / (2 * PPM)) as usize;
    let upper_index = ((PPM + confidence) * total).div_ceil(2 * PPM) as usize;
    let lower = means[lower_index];
    let upper = means[upper_index - 1];

    let median = if n % 2 == 0 {
        fsum(&[means[n / 2 - 1], means[n / 2]]) / 2.0
    } else {
        means[n / 2]
    };
    let ci = fsum_iter([upper - median, median - lower]) / 2.0;

    BootstrapEstimate {
        median,
        ci,
        lower,
        upper,
    }
}
