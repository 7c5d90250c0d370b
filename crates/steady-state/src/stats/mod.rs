//! Statistical primitives for run sequences
//!
//! This module provides the building blocks used by the rest of the crate:
//! sliding windows, percentiles, accurate floating-point summation, and
//! windowed outlier detection.
//!
//! # Examples
//!
//! ```
//! use steady_state::stats::{detect, OutlierSet, median_iqr};
//!
//! // Two executions of the same benchmark, both with a spike at index 60
//! let mut first = vec![1.0; 100];
//! let mut second = vec![1.0; 100];
//! first[60] = 9.0;
//! second[60] = 9.0;
//! second[80] = 7.0;
//!
//! let all = vec![detect(&first, 20).unwrap(), detect(&second, 20).unwrap()];
//! let sets = OutlierSet::for_executions(all, 1);
//! assert_eq!(sets[1].common, vec![60]);
//! assert_eq!(sets[1].unique, vec![80]);
//!
//! let (median, (p5, p95)) = median_iqr(&[3.0, 1.0, 2.0]).unwrap();
//! assert_eq!(median, 2.0);
//! assert!(p5 < median && median < p95);
//! ```

pub mod outliers;
pub mod percentiles;
pub mod summation;
pub mod window;

// Re-export main types and functions
pub use outliers::{detect, partition, OutlierSet};
pub use percentiles::{median, median_iqr, percentile};
pub use summation::{fsum, mean};
