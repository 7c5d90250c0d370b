//! Percentile calculations for run sequences.
//!
//! All functions here expect their input to be sorted in ascending order,
//! since callers (the sliding-window outlier detector in particular) sort a
//! window once and then read several percentiles from it.

use crate::error::StatsError;

/// Sort a copy of `samples` in ascending order.
///
/// NaN values compare as equal to everything, matching how the rest of the
/// crate treats timing data (which should never contain NaN).
pub fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

/// Calculate the `pc`'th percentile of a sorted slice.
///
/// Uses linear interpolation between the two enclosing order statistics when
/// the percentile falls between two data points.
///
/// # Errors
///
/// * [`StatsError::InvalidPercentile`] - if `pc` is outside `[0, 100]`
/// * [`StatsError::EmptyWindow`] - if `sorted` is empty
///
/// # Examples
///
/// ```
/// use steady_state::stats::percentiles::percentile;
///
/// let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(percentile(&data, 50.0), Ok(3.0));
/// assert_eq!(percentile(&data, 25.0), Ok(2.0));
/// ```
pub fn percentile(sorted: &[f64], pc: f64) -> Result<f64, StatsError> {
    if !(0.0..=100.0).contains(&pc) {
        return Err(StatsError::InvalidPercentile(pc));
    }
    if sorted.is_empty() {
        return Err(StatsError::EmptyWindow);
    }
    if sorted.len() == 1 {
        return Ok(sorted[0]);
    }

    let index = (sorted.len() - 1) as f64 * (pc / 100.0);
    let index_floor = index.floor();
    let index_ceil = index.ceil();

    if index_floor == index_ceil {
        return Ok(sorted[index as usize]);
    }

    let d0 = sorted[index_floor as usize] * (index_ceil - index);
    let d1 = sorted[index_ceil as usize] * (index - index_floor);
    Ok(d0 + d1)
}

/// Median of a sorted slice.
///
/// Identical to `percentile(sorted, 50.0)` but avoids the interpolation
/// arithmetic.
///
/// # Examples
///
/// ```
/// use steady_state::stats::percentiles::median;
///
/// assert_eq!(median(&[1.0, 2.0, 3.0]), Ok(2.0));
/// assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Ok(2.5));
/// ```
pub fn median(sorted: &[f64]) -> Result<f64, StatsError> {
    let size = sorted.len();
    match size {
        0 => Err(StatsError::EmptyWindow),
        1 => Ok(sorted[0]),
        _ => {
            let index = (size - 1) / 2;
            if size % 2 == 1 {
                Ok(sorted[index])
            } else {
                Ok((sorted[index] + sorted[index + 1]) / 2.0)
            }
        }
    }
}

/// Lower and upper percentiles reported alongside a median.
pub const IQR_LOWER_PC: f64 = 5.0;
pub const IQR_UPPER_PC: f64 = 95.0;

/// Median plus the (5th, 95th) percentile pair of unsorted `values`.
///
/// The pair is used as an asymmetric error bar on steady-state iteration
/// numbers and times to reach a steady state.
///
/// # Examples
///
/// ```
/// use steady_state::stats::percentiles::median_iqr;
///
/// let (median, (low, high)) = median_iqr(&[3.0, 1.0, 2.0]).unwrap();
/// assert_eq!(median, 2.0);
/// assert!(low < median && median < high);
/// ```
pub fn median_iqr(values: &[f64]) -> Result<(f64, (f64, f64)), StatsError> {
    let sorted = sorted(values);
    let median = median(&sorted)?;
    let low = percentile(&sorted, IQR_LOWER_PC)?;
    let high = percentile(&sorted, IQR_UPPER_PC)?;
    Ok((median, (low, high)))
}
