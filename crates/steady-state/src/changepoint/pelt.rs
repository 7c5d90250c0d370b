//! Pruned Exact Linear Time changepoint search (Killick, Fearnhead & Eckley).
//!
//! Segments are scored with the negative Gaussian log-likelihood under a
//! change in both mean and variance:
//!
//! ```text
//! C(y[a..b]) = m * (ln 2π + ln σ̂² + 1),   m = b - a
//! ```
//!
//! and every changepoint costs `penalty_multiplier * ln(n)`.

use super::ChangepointDetector;

/// Variances below this are clamped, otherwise a constant segment would have
/// a cost of negative infinity.
pub const VARIANCE_FLOOR: f64 = 1e-11;

/// Default multiplier for the `k * ln(n)` penalty.
pub const DEFAULT_PENALTY_MULTIPLIER: f64 = 15.0;

/// Shortest segment PELT may produce; a variance needs two points.
pub const DEFAULT_MIN_SEGMENT_LENGTH: usize = 2;

const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// PELT over the normal mean/variance cost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pelt {
    pub penalty_multiplier: f64,
    pub min_segment_length: usize,
}

impl Default for Pelt {
    fn default() -> Self {
        Self {
            penalty_multiplier: DEFAULT_PENALTY_MULTIPLIER,
            min_segment_length: DEFAULT_MIN_SEGMENT_LENGTH,
        }
    }
}

impl Pelt {
    pub fn new(penalty_multiplier: f64) -> Self {
        Self {
            penalty_multiplier,
            ..Self::default()
        }
    }
}

/// Prefix sums of centred values and their squares, for O(1) segment costs.
struct SegmentCost {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl SegmentCost {
    fn new(values: &[f64]) -> Self {
        // Centring first keeps sum_sq / m - mean² from cancelling badly.
        let centre = values.iter().sum::<f64>() / values.len() as f64;
        let mut sum = Vec::with_capacity(values.len() + 1);
        let mut sum_sq = Vec::with_capacity(values.len() + 1);
        sum.push(0.0);
        sum_sq.push(0.0);
        let (mut s, mut s2) = (0.0, 0.0);
        for &v in values {
            let x = v - centre;
            s += x;
            s2 += x * x;
            sum.push(s);
            sum_sq.push(s2);
        }
        Self { sum, sum_sq }
    }

    /// Cost of the half-open range `[start, end)`.
    fn cost(&self, start: usize, end: usize) -> f64 {
        let m = (end - start) as f64;
        let mean = (self.sum[end] - self.sum[start]) / m;
        let mut variance = (self.sum_sq[end] - self.sum_sq[start]) / m - mean * mean;
        if variance < VARIANCE_FLOOR {
            variance = VARIANCE_FLOOR;
        }
        m * (LN_2PI + variance.ln() + 1.0)
    }
}

impl ChangepointDetector for Pelt {
    fn find_changepoints(&self, values: &[f64]) -> Vec<usize> {
        let n = values.len();
        let min_seg = self.min_segment_length.max(1);
        if n < 2 * min_seg {
            return Vec::new();
        }

        let penalty = self.penalty_multiplier * (n as f64).ln();
        let costs = SegmentCost::new(values);

        // best[t]: optimal penalised cost of values[..t]; last[t]: start of its final segment.
        let mut best = vec![f64::INFINITY; n + 1];
        let mut last = vec![0usize; n + 1];
        best[0] = -penalty;
        let mut candidates: Vec<usize> = vec![0];

        for t in min_seg..=n {
            if t >= 2 * min_seg {
                candidates.push(t - min_seg);
            }

            let mut scored = Vec::with_capacity(candidates.len());
            let mut best_t = f64::INFINITY;
            let mut best_tau = 0;
            for &tau in &candidates {
                let score = best[tau] + costs.cost(tau, t);
                if score + penalty < best_t {
                    best_t = score + penalty;
                    best_tau = tau;
                }
                scored.push((tau, score));
            }
            best[t] = best_t;
            last[t] = best_tau;

            candidates = scored
                .into_iter()
                .filter(|&(_, score)| score <= best_t)
                .map(|(tau, _)| tau)
                .collect();
        }

        let mut changepoints = Vec::new();
        let mut t = n;
        while t > 0 {
            let tau = last[t];
            if tau > 0 {
                changepoints.push(tau - 1);
            }
            t = tau;
        }
        changepoints.reverse();
        changepoints
    }
}
