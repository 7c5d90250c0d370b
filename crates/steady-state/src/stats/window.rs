//! Sliding windows over a run sequence.
//!
//! Windows are centred on an index and clamped to the sequence, so windows
//! near either end are shorter than `window_size` rather than padded.
//! Consumers that need full-size windows must skip edge indices themselves.

use super::percentiles::{self, sorted};
use super::summation;
use crate::error::StatsError;

/// Half-open `[lo, hi)` bounds of the window centred on `index`.
///
/// `half = window_size / 2`, `lo = max(0, index - half)`,
/// `hi = min(len, index + half)`.
///
/// # Examples
///
/// ```
/// use steady_state::stats::window::clamp_window;
///
/// assert_eq!(clamp_window(50, 1000, 200), (0, 150));
/// assert_eq!(clamp_window(300, 1000, 200), (200, 400));
/// assert_eq!(clamp_window(950, 1000, 200), (850, 1000));
/// ```
pub fn clamp_window(index: usize, len: usize, window_size: usize) -> (usize, usize) {
    let half = window_size / 2;
    let lo = index.saturating_sub(half);
    let hi = index.saturating_add(half).min(len);
    (lo, hi)
}

/// The clamped window of `data` centred on `index`.
pub fn window(data: &[f64], index: usize, window_size: usize) -> &[f64] {
    let (lo, hi) = clamp_window(index, data.len(), window_size);
    if lo >= hi {
        return &[];
    }
    &data[lo..hi]
}

/// Whether the window at `index` is cut short by the start of the sequence.
///
/// Only the start is checked: short windows at the end of a sequence are
/// still analysed by the outlier detector.
pub fn is_short_start_window(index: usize, len: usize, window_size: usize) -> bool {
    let (lo, hi) = clamp_window(index, len, window_size);
    lo == 0 && hi < window_size
}

/// Mean of the window centred on `index`.
pub fn window_mean(data: &[f64], index: usize, window_size: usize) -> Result<f64, StatsError> {
    summation::mean(window(data, index, window_size)).ok_or(StatsError::EmptyWindow)
}

/// Population variance of the window centred on `index`.
pub fn window_variance(data: &[f64], index: usize, window_size: usize) -> Result<f64, StatsError> {
    summation::variance(window(data, index, window_size)).ok_or(StatsError::EmptyWindow)
}

/// Population standard deviation of the window centred on `index`.
pub fn window_std_dev(data: &[f64], index: usize, window_size: usize) -> Result<f64, StatsError> {
    window_variance(data, index, window_size).map(f64::sqrt)
}

/// `pc`'th percentile of the window centred on `index`.
pub fn window_percentile(
    data: &[f64],
    index: usize,
    window_size: usize,
    pc: f64,
) -> Result<f64, StatsError> {
    percentiles::percentile(&sorted(window(data, index, window_size)), pc)
}

/// Median of the window centred on `index`.
pub fn window_median(data: &[f64], index: usize, window_size: usize) -> Result<f64, StatsError> {
    percentiles::median(&sorted(window(data, index, window_size)))
}
