//! Results bundles
//!
//! A results bundle holds the wallclock timings of every process execution of
//! every benchmark run on one machine, keyed by `benchmark:vm:variant`.
//! Annotating a bundle caches the outliers, changepoints, segment statistics
//! and classifications of each execution alongside the parameters that
//! produced them, so later steps can reuse them.
//!
//! # Example
//!
//! ```
//! use steady_state::bundle::ResultsBundle;
//! use steady_state::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut bundle = ResultsBundle::from_json(
//!     r#"{"wallclock_times": {"nbody:PyPy:default-python": [[1.0, 1.0, 1.0, 1.0]]}}"#,
//! )?;
//! let config = Config::default();
//! assert!(bundle.is_stale(&config));
//!
//! bundle.annotate(&config)?;
//! assert!(!bundle.is_stale(&config));
//! assert_eq!(bundle.classifications["nbody:PyPy:default-python"][0].as_str(), "flat");
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::analysis::{analyse_executions, ExecutionAnalysis};
use crate::changepoint::SegmentSequence;
use crate::classify::Classification;
use crate::config::{AnalysisParams, Config};
use crate::error::StatsError;
use crate::instruments::{ChartSeries, VmKind};
use crate::key::ExecutionKey;
use crate::stats::OutlierSet;

/// Per-key lists, one entry per process execution.
pub type PerKey<T> = BTreeMap<String, Vec<T>>;

/// Audit information recorded with the measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uname: Option<String>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

/// Measurements of one machine, plus any cached annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsBundle {
    pub wallclock_times: PerKey<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<Audit>,
    /// VM instrumentation recorded alongside the timings, per key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instr_data: BTreeMap<String, InstrData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_size: Option<usize>,
    /// Parameters the cached annotation was computed with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisParams>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub all_outliers: PerKey<Vec<usize>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_outliers: PerKey<Vec<usize>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unique_outliers: PerKey<Vec<usize>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changepoints: PerKey<Vec<usize>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changepoint_means: PerKey<Vec<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changepoint_vars: PerKey<Vec<f64>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub classifications: PerKey<Classification>,
}

/// Instrumentation of one benchmark, as written by an instrumented VM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrData {
    /// Raw event rows, one list per process execution
    #[serde(default)]
    pub raw_vm_events: Vec<Vec<Value>>,
}

/// Why a key is left out of analysis, if it is.
pub fn skip_reason(executions: &[Vec<f64>]) -> Option<&'static str> {
    match executions.first() {
        None => Some("no executions"),
        Some(first) if first.is_empty() => Some("benchmark crashed"),
        Some(_) => None,
    }
}

impl ResultsBundle {
    /// Load a bundle from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read results bundle: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to load results bundle: {}", path.display()))
    }

    /// Parse a bundle from a JSON string
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("Failed to parse results bundle JSON")
    }

    pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(output)
    }

    /// Write the bundle (with any annotation) to a JSON file
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json(false)?)
            .with_context(|| format!("Failed to write results bundle: {}", path.display()))
    }

    /// Short machine name: the host field of `uname`, without its domain.
    ///
    /// # Examples
    ///
    /// ```
    /// use steady_state::bundle::{Audit, ResultsBundle};
    ///
    /// let bundle = ResultsBundle {
    ///     audit: Some(Audit {
    ///         uname: Some("Linux bencher3.soft-dev.org 4.9.0-3-amd64 #1 SMP x86_64".into()),
    ///         ..Audit::default()
    ///     }),
    ///     ..ResultsBundle::default()
    /// };
    /// assert_eq!(bundle.machine_name().as_deref(), Some("bencher3"));
    /// ```
    pub fn machine_name(&self) -> Option<String> {
        let uname = self.audit.as_ref()?.uname.as_ref()?;
        let host = uname.split_whitespace().nth(1)?;
        host.split('.').next().map(str::to_string)
    }

    /// Whether the cached annotation is missing or was made with other parameters.
    pub fn is_stale(&self, config: &Config) -> bool {
        self.analysis != Some(config.analysis_params())
    }

    /// Keys that can be analysed, logging a warning for each one skipped.
    pub fn analysable_keys(&self) -> Vec<&str> {
        self.wallclock_times
            .iter()
            .filter_map(|(key, executions)| match skip_reason(executions) {
                Some(reason) => {
                    warn!("Skipping: {} ({})", key, reason);
                    None
                }
                None => Some(key.as_str()),
            })
            .collect()
    }

    /// Compute and cache the annotation of every analysable key.
    ///
    /// Any previous annotation is discarded. Keys are analysed in parallel.
    #[instrument(skip_all, fields(keys = self.wallclock_times.len()))]
    pub fn annotate(&mut self, config: &Config) -> Result<(), StatsError> {
        config.validate()?;
        info!(
            "Annotating bundle (window {}, threshold {})",
            config.outliers.window_size, config.outliers.threshold
        );

        let keys = self.analysable_keys();
        let annotated = keys
            .par_iter()
            .map(|&key| {
                analyse_executions(key, &self.wallclock_times[key], config)
                    .map(|analyses| (key.to_string(), analyses))
            })
            .collect::<Result<Vec<_>, StatsError>>()?;

        self.clear_annotation();
        for (key, analyses) in annotated {
            self.store(key, &analyses);
        }
        self.window_size = Some(config.outliers.window_size);
        self.analysis = Some(config.analysis_params());
        Ok(())
    }

    fn clear_annotation(&mut self) {
        self.window_size = None;
        self.analysis = None;
        self.all_outliers.clear();
        self.common_outliers.clear();
        self.unique_outliers.clear();
        self.changepoints.clear();
        self.changepoint_means.clear();
        self.changepoint_vars.clear();
        self.classifications.clear();
    }

    fn store(&mut self, key: String, analyses: &[ExecutionAnalysis]) {
        self.all_outliers.insert(
            key.clone(),
            analyses.iter().map(|a| a.outliers.all.clone()).collect(),
        );
        self.common_outliers.insert(
            key.clone(),
            analyses.iter().map(|a| a.outliers.common.clone()).collect(),
        );
        self.unique_outliers.insert(
            key.clone(),
            analyses.iter().map(|a| a.outliers.unique.clone()).collect(),
        );
        self.changepoints.insert(
            key.clone(),
            analyses.iter().map(ExecutionAnalysis::changepoints).collect(),
        );
        self.changepoint_means.insert(
            key.clone(),
            analyses.iter().map(ExecutionAnalysis::segment_means).collect(),
        );
        self.changepoint_vars.insert(
            key.clone(),
            analyses
                .iter()
                .map(ExecutionAnalysis::segment_variances)
                .collect(),
        );
        self.classifications
            .insert(key, analyses.iter().map(|a| a.classification).collect());
    }

    /// Analyses of `key`, from the cache when it is fresh, otherwise computed.
    pub fn execution_analyses(
        &self,
        key: &str,
        config: &Config,
    ) -> Result<Vec<ExecutionAnalysis>, StatsError> {
        if !self.is_stale(config) && self.classifications.contains_key(key) {
            self.cached_analyses(key)
        } else {
            let executions = self.wallclock_times.get(key).map_or(&[][..], Vec::as_slice);
            analyse_executions(key, executions, config)
        }
    }

    /// Rebuild the cached analyses of `key`.
    ///
    /// # Errors
    ///
    /// * [`StatsError::MismatchedExecutions`] - a cached list has the wrong number of entries
    /// * [`StatsError::CorruptAnnotation`] - cached outliers or changepoints do not fit the timings
    pub fn cached_analyses(&self, key: &str) -> Result<Vec<ExecutionAnalysis>, StatsError> {
        let timings = self.wallclock_times.get(key).map_or(&[][..], Vec::as_slice);
        let expected = timings.len();
        let all = cached_field(key, "all_outliers", &self.all_outliers, expected)?;
        let common = cached_field(key, "common_outliers", &self.common_outliers, expected)?;
        let unique = cached_field(key, "unique_outliers", &self.unique_outliers, expected)?;
        let changepoints = cached_field(key, "changepoints", &self.changepoints, expected)?;
        let means = cached_field(key, "changepoint_means", &self.changepoint_means, expected)?;
        let classes = cached_field(key, "classifications", &self.classifications, expected)?;

        let corrupt = |pexec: usize, reason: &str| StatsError::CorruptAnnotation {
            key: key.to_string(),
            reason: format!("execution {}: {}", pexec, reason),
        };

        (0..expected)
            .map(|pexec| {
                if !is_strictly_increasing(&all[pexec]) {
                    return Err(corrupt(pexec, "outliers are not sorted"));
                }
                let outliers = OutlierSet {
                    all: all[pexec].clone(),
                    common: common[pexec].clone(),
                    unique: unique[pexec].clone(),
                };
                let classification = classes[pexec];
                let segments = if classification == Classification::CouldNotClassify {
                    None
                } else {
                    let cps = &changepoints[pexec];
                    let len = timings[pexec].len();
                    if !is_strictly_increasing(cps) || cps.last().is_some_and(|&c| c + 1 >= len) {
                        return Err(corrupt(pexec, "changepoints out of range"));
                    }
                    if means[pexec].len() != cps.len() + 1 {
                        return Err(corrupt(pexec, "segment count does not match changepoints"));
                    }
                    let segments =
                        SegmentSequence::from_changepoints(&timings[pexec], &outliers, cps.clone())
                            .map_err(|e| corrupt(pexec, &e.to_string()))?;
                    Some(segments)
                };
                Ok(ExecutionAnalysis {
                    outliers,
                    segments,
                    classification,
                })
            })
            .collect()
    }

    /// Parsed instrumentation series for `key`, if its VM has a parser and data was recorded.
    pub fn chart_series(
        &self,
        key: &ExecutionKey,
    ) -> Option<Result<Vec<Vec<ChartSeries>>, StatsError>> {
        let vm = VmKind::from_name(&key.vm)?;
        let instr = self.instr_data.get(&key.to_string())?;
        Some(vm.parse(&instr.raw_vm_events))
    }
}

fn cached_field<'a, T>(
    key: &str,
    field: &str,
    cache: &'a PerKey<T>,
    expected: usize,
) -> Result<&'a [T], StatsError> {
    let entries = cache.get(key).map_or(&[][..], Vec::as_slice);
    if entries.len() != expected {
        return Err(StatsError::MismatchedExecutions {
            key: key.to_string(),
            field: field.to_string(),
            expected,
            found: entries.len(),
        });
    }
    Ok(entries)
}

fn is_strictly_increasing(indices: &[usize]) -> bool {
    indices.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delta;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const KEY: &str = "bench:vm:default";

    fn step_bundle() -> ResultsBundle {
        let mut warm = vec![10.0; 100];
        warm.extend(vec![1.0; 100]);
        let mut wallclock_times = BTreeMap::new();
        wallclock_times.insert(KEY.to_string(), vec![warm, vec![1.0; 200]]);
        wallclock_times.insert("empty:vm:default".to_string(), vec![]);
        wallclock_times.insert("crashed:vm:default".to_string(), vec![vec![], vec![1.0]]);
        ResultsBundle {
            wallclock_times,
            ..ResultsBundle::default()
        }
    }

    fn step_config() -> Config {
        let mut config = Config::default();
        config.outliers.window_size = 50;
        config.classification.delta = Delta::Absolute(1.0);
        config.classification.steady_state_window = 50;
        config
    }

    #[test]
    fn test_annotate_skips_empty_and_crashed() {
        let mut bundle = step_bundle();
        bundle.annotate(&step_config()).unwrap();
        assert_eq!(bundle.classifications.keys().collect::<Vec<_>>(), vec![KEY]);
        assert_eq!(
            bundle.classifications[KEY],
            vec![Classification::Warmup, Classification::Flat]
        );
        assert_eq!(bundle.changepoints[KEY], vec![vec![99], vec![]]);
        assert_eq!(bundle.changepoint_means[KEY], vec![vec![10.0, 1.0], vec![1.0]]);
        assert_eq!(bundle.window_size, Some(50));
    }

    #[test]
    fn test_staleness() {
        let mut bundle = step_bundle();
        let config = step_config();
        assert!(bundle.is_stale(&config));
        bundle.annotate(&config).unwrap();
        assert!(!bundle.is_stale(&config));

        let mut other = config.clone();
        other.outliers.threshold = 2;
        assert!(bundle.is_stale(&other));
        let mut other = config.clone();
        other.classification.delta = Delta::Percent(1.0);
        assert!(bundle.is_stale(&other));

        // Bootstrap settings do not affect the annotation.
        let mut other = config;
        other.bootstrap.seed = Some(3);
        assert!(!bundle.is_stale(&other));
    }

    #[test]
    fn test_annotation_json_round_trip() {
        let mut bundle = step_bundle();
        bundle.annotate(&step_config()).unwrap();
        let json = bundle.to_json(true).unwrap();
        let reloaded = ResultsBundle::from_json(&json).unwrap();
        assert_eq!(reloaded, bundle);
    }

    #[test]
    fn test_cached_analyses_match_fresh() {
        let mut bundle = step_bundle();
        let config = step_config();
        bundle.annotate(&config).unwrap();
        let cached = bundle.execution_analyses(KEY, &config).unwrap();
        let fresh = analyse_executions(KEY, &bundle.wallclock_times[KEY], &config).unwrap();
        assert_eq!(cached, fresh);
    }

    #[test]
    fn test_mismatched_cache_is_rejected() {
        let mut bundle = step_bundle();
        bundle.annotate(&step_config()).unwrap();
        bundle.classifications.get_mut(KEY).unwrap().pop();
        assert_eq!(
            bundle.cached_analyses(KEY),
            Err(StatsError::MismatchedExecutions {
                key: KEY.to_string(),
                field: "classifications".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_corrupt_changepoints_are_rejected() {
        let mut bundle = step_bundle();
        bundle.annotate(&step_config()).unwrap();
        bundle.changepoints.get_mut(KEY).unwrap()[0] = vec![500];
        assert!(matches!(
            bundle.cached_analyses(KEY),
            Err(StatsError::CorruptAnnotation { .. })
        ));
    }

    #[test]
    fn test_machine_name() {
        let bundle: ResultsBundle = serde_json::from_value(json!({
            "wallclock_times": {},
            "audit": {"uname": "Linux bencher8.example.org 4.9.0 x86_64", "cpuinfo": "..."}
        }))
        .unwrap();
        assert_eq!(bundle.machine_name().as_deref(), Some("bencher8"));
        assert_eq!(
            bundle.audit.as_ref().unwrap().other["cpuinfo"],
            json!("...")
        );
        assert_eq!(ResultsBundle::default().machine_name(), None);
    }

    #[test]
    fn test_chart_series() {
        let bundle: ResultsBundle = serde_json::from_value(json!({
            "wallclock_times": {
                "fasta:Hotspot:default-java": [[0.5, 0.4]],
                "fasta:PyPy:default-python": [[0.5, 0.4]]
            },
            "instr_data": {
                "fasta:Hotspot:default-java": {
                    "raw_vm_events": [[[0, 2, []], [1, 3, []]]]
                },
                "fasta:PyPy:default-python": {
                    "raw_vm_events": [[[0, 2, []]]]
                }
            }
        }))
        .unwrap();

        let hotspot: ExecutionKey = "fasta:Hotspot:default-java".parse().unwrap();
        let series = bundle.chart_series(&hotspot).unwrap().unwrap();
        assert_eq!(series[0][0].data, vec![0.002, 0.001]);

        let pypy: ExecutionKey = "fasta:PyPy:default-python".parse().unwrap();
        assert!(bundle.chart_series(&pypy).is_none());

        let round_trip = serde_json::to_value(&bundle).unwrap();
        assert_eq!(
            round_trip["instr_data"]["fasta:Hotspot:default-java"]["raw_vm_events"][0][1],
            json!([1, 3, []])
        );
    }
}
