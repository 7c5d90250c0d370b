//! Per-benchmark steady-state summaries
//!
//! Sibling process executions of each benchmark are combined into one
//! [`SteadyStateSummary`]: the reported classification, when a steady state
//! was reached (iteration and wallclock time), and the bootstrapped
//! steady-state performance. Benchmarks are summarised in parallel, one
//! rayon task per benchmark.
//!
//! # Example
//!
//! ```
//! use steady_state::bundle::ResultsBundle;
//! use steady_state::config::Config;
//! use steady_state::summary::summarise;
//!
//! # fn example() -> anyhow::Result<()> {
//! let bundle = ResultsBundle::from_json(
//!     r#"{"wallclock_times": {"nbody:PyPy:default": [[1.0, 1.0, 1.0, 1.0]]}}"#,
//! )?;
//! let mut config = Config::default();
//! config.bootstrap.seed = Some(1);
//!
//! let document = summarise(&bundle, &config)?;
//! let nbody = &document.machines["unknown"]["PyPy"]["nbody"];
//! assert_eq!(nbody.classification.as_str(), "flat");
//! assert_eq!(nbody.steady_state_time, Some(1.0));
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::analysis::{resolve_delta, ExecutionAnalysis};
use crate::bootstrap::bootstrap_steady_perf;
use crate::bundle::ResultsBundle;
use crate::classify::{aggregate, Classification, ClassificationCounts, ReportedClassification};
use crate::config::Config;
use crate::error::StatsError;
use crate::key::ExecutionKey;
use crate::stats::percentiles::median_iqr;
use crate::stats::summation::fsum;

/// Version of the summary document layout.
pub const WARMUP_FORMAT_VERSION: &str = "2";

/// Machine name used when a bundle records no `uname`.
pub const UNKNOWN_MACHINE: &str = "unknown";

/// Summaries by machine, VM and benchmark name.
pub type MachineSummaries = BTreeMap<String, BTreeMap<String, BTreeMap<String, SteadyStateSummary>>>;

/// Persisted summary of a results bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub warmup_format_version: String,
    pub generated_at: DateTime<Utc>,
    pub machines: MachineSummaries,
}

impl SummaryDocument {
    /// Load a summary, refusing documents written in another format version.
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let document: SummaryDocument =
            serde_json::from_str(s).context("Failed to parse summary JSON")?;
        if document.warmup_format_version != WARMUP_FORMAT_VERSION {
            return Err(StatsError::UnsupportedFormat(format!(
                "summary format version {} (expected {})",
                document.warmup_format_version, WARMUP_FORMAT_VERSION
            ))
            .into());
        }
        Ok(document)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read summary: {}", path.display()))?;
        Self::from_json(&content)
    }

    /// Number of benchmarks summarised, over all machines and VMs.
    pub fn benchmark_count(&self) -> usize {
        self.machines
            .values()
            .flat_map(|vms| vms.values())
            .map(BTreeMap::len)
            .sum()
    }
}

/// Summary of all process executions of one benchmark on one VM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteadyStateSummary {
    pub classification: ReportedClassification,
    pub detailed_classification: ClassificationCounts,
    /// Median 1-based iteration at which a steady state was reached
    pub steady_state_iteration: Option<f64>,
    /// (5th, 95th) percentiles of the steady-state iteration
    pub steady_state_iteration_iqr: Option<(f64, f64)>,
    pub steady_state_iteration_list: Vec<usize>,
    /// Median wallclock seconds spent before the steady state
    pub steady_state_time_to_reach_secs: Option<f64>,
    pub steady_state_time_to_reach_secs_iqr: Option<(f64, f64)>,
    pub steady_state_time_to_reach_secs_list: Vec<f64>,
    /// Bootstrapped steady-state iteration time
    pub steady_state_time: Option<f64>,
    /// Confidence interval half-width of `steady_state_time`
    pub steady_state_time_ci: Option<f64>,
    /// Mean of the steady segments' means, per execution
    pub steady_state_time_list: Vec<f64>,
    pub process_executions: Vec<ProcessExecutionSummary>,
}

/// Detail record of one process execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessExecutionSummary {
    pub index: usize,
    pub classification: Classification,
    pub outliers: Vec<usize>,
    pub changepoints: Vec<usize>,
    pub segment_means: Vec<f64>,
}

/// Steady-state facts of one execution that reached a steady state.
struct SteadyExecution {
    /// Non-outlier timings of each steady segment, last segment first
    segments: Vec<Vec<f64>>,
    mean: f64,
    iteration: usize,
    time_to_reach: f64,
}

fn steady_execution(
    timings: &[f64],
    analysis: &ExecutionAnalysis,
    delta: f64,
) -> Option<SteadyExecution> {
    if !analysis.classification.has_steady_state() {
        return None;
    }
    let segments = analysis.segments.as_ref()?;
    let steady = segments.steady_region(delta);
    let steady_segments = &segments.segments()[steady.first_segment..];

    let data = steady_segments
        .iter()
        .rev()
        .map(|segment| {
            (segment.start..segment.end)
                .filter(|&i| !analysis.outliers.is_outlier(i))
                .map(|i| timings[i])
                .collect()
        })
        .collect();
    let mean = steady.mean(segments);

    let (iteration, time_to_reach) = if analysis.classification == Classification::Flat {
        (1, 0.0)
    } else {
        (steady.start + 1, fsum(&timings[..steady.start]))
    };

    Some(SteadyExecution {
        segments: data,
        mean,
        iteration,
        time_to_reach,
    })
}

/// Summarise one benchmark from its executions and their analyses.
///
/// Statistics that cannot be computed are left as `None` rather than failing
/// the benchmark. Returns `None` only when there are no executions.
pub fn summarise_benchmark<R: Rng>(
    key: &str,
    executions: &[Vec<f64>],
    analyses: &[ExecutionAnalysis],
    config: &Config,
    rng: &mut R,
) -> Option<SteadyStateSummary> {
    let classifications: Vec<Classification> =
        analyses.iter().map(|a| a.classification).collect();
    let classification = aggregate(&classifications)?;
    let counts = ClassificationCounts::from_classifications(&classifications);

    let delta = resolve_delta(config.classification.delta, analyses);
    let steady: Vec<SteadyExecution> = executions
        .iter()
        .zip(analyses)
        .filter_map(|(timings, analysis)| steady_execution(timings, analysis, delta))
        .collect();

    let iterations: Vec<usize> = steady.iter().map(|s| s.iteration).collect();
    let times_to_reach: Vec<f64> = steady.iter().map(|s| s.time_to_reach).collect();
    let means: Vec<f64> = steady.iter().map(|s| s.mean).collect();

    let mut summary = SteadyStateSummary {
        classification,
        detailed_classification: counts.clone(),
        steady_state_iteration: None,
        steady_state_iteration_iqr: None,
        steady_state_iteration_list: iterations,
        steady_state_time_to_reach_secs: None,
        steady_state_time_to_reach_secs_iqr: None,
        steady_state_time_to_reach_secs_list: times_to_reach,
        steady_state_time: None,
        steady_state_time_ci: None,
        steady_state_time_list: means,
        process_executions: analyses
            .iter()
            .enumerate()
            .map(|(index, analysis)| ProcessExecutionSummary {
                index,
                classification: analysis.classification,
                outliers: analysis.outliers.all.clone(),
                changepoints: analysis.changepoints(),
                segment_means: analysis.segment_means(),
            })
            .collect(),
    };

    if counts.get(Classification::NoSteadyState) > 0 {
        debug!("{}: some executions have no steady state", key);
        return Some(summary);
    }

    let bootstrap_input: Vec<Vec<Vec<f64>>> = steady.into_iter().map(|s| s.segments).collect();
    match bootstrap_steady_perf(
        &bootstrap_input,
        config.bootstrap.confidence,
        config.bootstrap.quality,
        rng,
    ) {
        Ok(estimate) => {
            summary.steady_state_time = Some(estimate.median);
            summary.steady_state_time_ci = Some(estimate.ci);
        }
        Err(e) => warn!("{}: cannot bootstrap steady-state time: {}", key, e),
    }

    if classification != ReportedClassification::Consistent(Classification::Flat) {
        let iterations: Vec<f64> = summary
            .steady_state_iteration_list
            .iter()
            .map(|&i| i as f64)
            .collect();
        if let Ok((median, iqr)) = median_iqr(&iterations) {
            summary.steady_state_iteration = Some(median);
            summary.steady_state_iteration_iqr = Some(iqr);
        }
        if let Ok((median, iqr)) = median_iqr(&summary.steady_state_time_to_reach_secs_list) {
            summary.steady_state_time_to_reach_secs = Some(median);
            summary.steady_state_time_to_reach_secs_iqr = Some(iqr);
        }
    }

    Some(summary)
}

/// Random source for the `index`'th benchmark: seeded when configured.
fn benchmark_rng(seed: Option<u64>, index: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Summarise every analysable benchmark in `bundle`.
///
/// Cached annotations are used when they match `config`, otherwise each
/// benchmark is analysed afresh.
///
/// # Errors
///
/// Fails on invalid configuration, malformed keys, or an inconsistent
/// cached annotation. Statistical problems within a benchmark only blank out
/// that benchmark's statistics.
#[instrument(skip_all, fields(machine = tracing::field::Empty))]
pub fn summarise(bundle: &ResultsBundle, config: &Config) -> Result<SummaryDocument, StatsError> {
    config.validate()?;
    let machine = bundle
        .machine_name()
        .unwrap_or_else(|| UNKNOWN_MACHINE.to_string());
    tracing::Span::current().record("machine", machine.as_str());

    let keys = bundle.analysable_keys();
    info!("Summarising {} benchmarks", keys.len());
    if !bundle.is_stale(config) {
        debug!("Using cached annotation");
    }

    let summaries = keys
        .par_iter()
        .enumerate()
        .map(|(index, &key)| {
            let parsed: ExecutionKey = key.parse()?;
            let analyses = bundle.execution_analyses(key, config)?;
            let mut rng = benchmark_rng(config.bootstrap.seed, index);
            let summary = summarise_benchmark(
                key,
                &bundle.wallclock_times[key],
                &analyses,
                config,
                &mut rng,
            );
            Ok::<_, StatsError>(summary.map(|summary| (parsed, summary)))
        })
        .collect::<Result<Vec<_>, StatsError>>()?;

    let mut vms: BTreeMap<String, BTreeMap<String, SteadyStateSummary>> = BTreeMap::new();
    for (key, summary) in summaries.into_iter().flatten() {
        vms.entry(key.vm).or_default().insert(key.benchmark, summary);
    }

    let mut machines = BTreeMap::new();
    machines.insert(machine, vms);
    Ok(SummaryDocument {
        warmup_format_version: WARMUP_FORMAT_VERSION.to_string(),
        generated_at: Utc::now(),
        machines,
    })
}
