//! Per-benchmark analysis pipeline
//!
//! Runs every process execution of one benchmark through outlier detection,
//! changepoint segmentation and classification. The result is what a results
//! bundle caches as its annotation.

use tracing::{debug, instrument};

use crate::changepoint::{analyse, Pelt, SegmentSequence};
use crate::classify::{classify, Classification};
use crate::config::{Config, Delta};
use crate::error::StatsError;
use crate::stats::outliers::{detect, OutlierSet};

/// Everything derived from one process execution's timings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionAnalysis {
    pub outliers: OutlierSet,
    /// `None` when the execution could not be segmented
    pub segments: Option<SegmentSequence>,
    pub classification: Classification,
}

impl ExecutionAnalysis {
    pub fn changepoints(&self) -> Vec<usize> {
        self.segments
            .as_ref()
            .map(|s| s.changepoints().to_vec())
            .unwrap_or_default()
    }

    pub fn segment_means(&self) -> Vec<f64> {
        self.segments.as_ref().map(|s| s.means()).unwrap_or_default()
    }

    pub fn segment_variances(&self) -> Vec<f64> {
        self.segments
            .as_ref()
            .map(|s| s.variances())
            .unwrap_or_default()
    }
}

/// Resolve `delta` against the fastest segment of any execution.
///
/// Percentage deltas with no segmented execution resolve to zero.
pub fn resolve_delta(delta: Delta, analyses: &[ExecutionAnalysis]) -> f64 {
    let fastest = analyses
        .iter()
        .filter_map(|a| a.segments.as_ref())
        .map(SegmentSequence::fastest_mean)
        .fold(f64::INFINITY, f64::min);
    if fastest.is_finite() {
        delta.resolve(fastest)
    } else {
        delta.resolve(0.0)
    }
}

/// Analyse all executions of the benchmark `key`.
///
/// Outliers are detected per execution, then partitioned into common and
/// unique across the siblings. Executions without enough usable data are
/// classified `could not classify` rather than failing the benchmark.
///
/// # Errors
///
/// Returns [`StatsError::InvalidConfig`] if the configured window is too small.
///
/// # Examples
///
/// ```
/// use steady_state::analysis::analyse_executions;
/// use steady_state::classify::Classification;
/// use steady_state::config::Config;
///
/// let executions = vec![vec![1.0; 10], vec![1.0; 10]];
/// let analyses = analyse_executions("bench:vm:variant", &executions, &Config::default()).unwrap();
/// assert!(analyses.iter().all(|a| a.classification == Classification::Flat));
/// ```
#[instrument(skip(executions, config), fields(pexecs = executions.len()))]
pub fn analyse_executions(
    key: &str,
    executions: &[Vec<f64>],
    config: &Config,
) -> Result<Vec<ExecutionAnalysis>, StatsError> {
    let window_size = config.outliers.window_size;
    let all_outliers = executions
        .iter()
        .map(|timings| detect(timings, window_size))
        .collect::<Result<Vec<_>, _>>()?;
    let outlier_sets = OutlierSet::for_executions(all_outliers, config.outliers.threshold);

    let detector = Pelt::new(config.changepoints.penalty_multiplier);
    let mut analyses: Vec<ExecutionAnalysis> = executions
        .iter()
        .zip(outlier_sets)
        .enumerate()
        .map(|(index, (timings, outliers))| {
            let segments = analyse(timings, &outliers, &detector)
                .map_err(|e| debug!("{} execution {}: {}", key, index, e))
                .ok();
            ExecutionAnalysis {
                outliers,
                segments,
                classification: Classification::CouldNotClassify,
            }
        })
        .collect();

    let delta = resolve_delta(config.classification.delta, &analyses);
    for analysis in &mut analyses {
        if let Some(segments) = &analysis.segments {
            analysis.classification =
                classify(segments, delta, config.classification.steady_state_window);
        }
    }

    debug!(
        "{}: {:?}",
        key,
        analyses.iter().map(|a| a.classification).collect::<Vec<_>>()
    );
    Ok(analyses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_with_window(window_size: usize, delta: f64, steady_state_window: usize) -> Config {
        let mut config = Config::default();
        config.outliers.window_size = window_size;
        config.classification.delta = Delta::Absolute(delta);
        config.classification.steady_state_window = steady_state_window;
        config
    }

    #[test]
    fn test_step_down_is_warmup() {
        let mut timings = vec![10.0; 100];
        timings.extend(vec![1.0; 100]);
        let config = config_with_window(50, 1.0, 50);

        let analyses = analyse_executions("b:v:x", &[timings], &config).unwrap();
        assert_eq!(analyses.len(), 1);
        assert!(!analyses[0].outliers.has_outliers());
        assert_eq!(analyses[0].changepoints(), vec![99]);
        assert_eq!(analyses[0].segment_means(), vec![10.0, 1.0]);
        assert_eq!(analyses[0].classification, Classification::Warmup);
    }

    #[test]
    fn test_step_down_is_warmup_with_default_steady_window() {
        let mut timings = vec![10.0; 100];
        timings.extend(vec![1.0; 100]);
        let mut config = Config::default();
        config.outliers.window_size = 50;
        config.classification.delta = Delta::Absolute(1.0);

        let analyses = analyse_executions("b:v:x", &[timings], &config).unwrap();
        assert_eq!(analyses[0].changepoints(), vec![99]);
        assert_eq!(analyses[0].classification, Classification::Warmup);
    }

    #[test]
    fn test_too_little_data_could_not_classify() {
        let config = Config::default();
        let analyses = analyse_executions("b:v:x", &[vec![1.0], vec![]], &config).unwrap();
        assert!(analyses
            .iter()
            .all(|a| a.classification == Classification::CouldNotClassify && a.segments.is_none()));
        assert!(analyses[0].changepoints().is_empty());
    }

    #[test]
    fn test_rejects_tiny_window() {
        let mut config = Config::default();
        config.outliers.window_size = 1;
        assert!(analyse_executions("b:v:x", &[vec![1.0; 5]], &config).is_err());
    }

    #[test]
    fn test_resolve_percent_delta_uses_fastest_segment() {
        let config = config_with_window(50, 0.0, 50);
        let analyses =
            analyse_executions("b:v:x", &[vec![4.0; 20], vec![2.0; 20]], &config).unwrap();
        assert_eq!(resolve_delta(Delta::Percent(50.0), &analyses), 1.0);
        assert_eq!(resolve_delta(Delta::Absolute(0.3), &analyses), 0.3);
        assert_eq!(resolve_delta(Delta::Percent(50.0), &[]), 0.0);
    }

    #[test]
    fn test_shared_outlier_is_common() {
        let mut first = vec![1.0; 100];
        let mut second = vec![1.0; 100];
        first[42] = 50.0;
        second[42] = 50.0;
        let config = config_with_window(20, 0.001, 500);
        let analyses = analyse_executions("b:v:x", &[first, second], &config).unwrap();
        for analysis in &analyses {
            assert_eq!(analysis.outliers.common, vec![42]);
            assert!(analysis.outliers.unique.is_empty());
            assert_eq!(analysis.classification, Classification::Flat);
        }
    }
}
