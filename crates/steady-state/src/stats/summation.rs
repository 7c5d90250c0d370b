//! Order-stable floating-point summation and the moments built on it.
//!
//! Bootstrap resampling averages hundreds of thousands of means; naive
//! left-to-right summation drifts noticeably at that scale, so every mean in
//! this crate goes through [`fsum`].

/// Exactly rounded sum of `values`.
///
/// Shewchuk's algorithm: keeps a list of non-overlapping partial sums so the
/// result is the correctly rounded value of the true sum, whatever the input
/// order.
///
/// # Examples
///
/// ```
/// use steady_state::stats::summation::fsum;
///
/// assert_eq!(fsum(&[0.1; 10]), 1.0);
/// assert_eq!(fsum(&[1e100, 1.0, -1e100]), 1.0);
/// ```
pub fn fsum(values: &[f64]) -> f64 {
    fsum_iter(values.iter().copied())
}

/// [`fsum`] over any iterator of values.
pub fn fsum_iter<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut partials: Vec<f64> = Vec::new();

    for mut x in values {
        let mut i = 0;
        for j in 0..partials.len() {
            let mut y = partials[j];
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let hi = x + y;
            let lo = y - (hi - x);
            if lo != 0.0 {
                partials[i] = lo;
                i += 1;
            }
            x = hi;
        }
        partials.truncate(i);
        partials.push(x);
    }

    let mut n = partials.len();
    if n == 0 {
        return 0.0;
    }

    n -= 1;
    let mut hi = partials[n];
    let mut lo = 0.0;
    while n > 0 {
        let x = hi;
        n -= 1;
        let y = partials[n];
        hi = x + y;
        let yr = hi - x;
        lo = y - yr;
        if lo != 0.0 {
            break;
        }
    }

    // Round half-even when the remaining partials push the result past a tie.
    if n > 0 && ((lo < 0.0 && partials[n - 1] < 0.0) || (lo > 0.0 && partials[n - 1] > 0.0)) {
        let y = lo * 2.0;
        let x = hi + y;
        let yr = x - hi;
        if y == yr {
            hi = x;
        }
    }
    hi
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(fsum(values) / values.len() as f64)
    }
}

/// Population variance (divides by `n`), or `None` for an empty slice.
///
/// This is the maximum likelihood estimate used by the changepoint cost, so
/// segment variances reported downstream agree with the segmentation.
pub fn variance(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let squared = fsum_iter(values.iter().map(|&x| (x - mean) * (x - mean)));
    Some(squared / values.len() as f64)
}

/// Population standard deviation, or `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}
