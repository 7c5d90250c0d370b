//! Integration tests for the analysis pipeline
//!
//! These tests drive results bundles through annotation and summarisation
//! using only the public API, starting from JSON as produced by a benchmark
//! runner.

use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use steady_state::bootstrap::{bootstrap_steady_perf, Quality};
use steady_state::config::Delta;
use steady_state::tally::{tally_by_threshold, OutlierSummary};
use steady_state::{
    summarise, Classification, Config, ReportedClassification, ResultsBundle, SummaryDocument,
};

fn warmup_config() -> Config {
    let mut config = Config::default();
    config.outliers.window_size = 50;
    config.classification.delta = Delta::Absolute(1.0);
    config.bootstrap.quality = Quality::Low;
    config.bootstrap.seed = Some(7);
    config
}

fn bundle_json(executions: &[Vec<f64>]) -> String {
    serde_json::json!({
        "wallclock_times": { "nbody:PyPy:default-python": executions },
        "audit": { "uname": "Linux bencher3.soft-dev.org 4.9.0-3-amd64 #1 SMP x86_64" },
    })
    .to_string()
}

fn step_down() -> Vec<f64> {
    let mut timings = vec![10.0; 100];
    timings.extend(vec![1.0; 100]);
    timings
}

#[test]
fn test_flat_run_sequence() {
    let mut bundle = ResultsBundle::from_json(&bundle_json(&[vec![1.0; 10]])).unwrap();
    let config = Config::default();
    bundle.annotate(&config).unwrap();

    let key = "nbody:PyPy:default-python";
    assert_eq!(bundle.all_outliers[key], vec![Vec::<usize>::new()]);
    assert_eq!(bundle.changepoints[key], vec![Vec::<usize>::new()]);
    assert_eq!(bundle.classifications[key], vec![Classification::Flat]);
}

#[test]
fn test_warmup_end_to_end() {
    let bundle = ResultsBundle::from_json(&bundle_json(&[step_down(), step_down()])).unwrap();
    let config = warmup_config();

    let document = summarise(&bundle, &config).unwrap();
    let summary = &document.machines["bencher3"]["PyPy"]["nbody"];

    assert_eq!(
        summary.classification,
        ReportedClassification::Consistent(Classification::Warmup)
    );
    assert_eq!(summary.process_executions[0].changepoints, vec![99]);
    assert_eq!(summary.steady_state_iteration, Some(101.0));
    assert_eq!(summary.steady_state_time_to_reach_secs, Some(1000.0));
    assert_eq!(summary.steady_state_time, Some(1.0));
    assert_eq!(summary.steady_state_time_ci, Some(0.0));
}

#[test]
fn test_shared_outlier_is_common() {
    let mut first = vec![1.0; 100];
    let mut second = vec![1.0; 100];
    first[42] = 40.0;
    second[42] = 40.0;
    let mut bundle = ResultsBundle::from_json(&bundle_json(&[first, second])).unwrap();
    let mut config = Config::default();
    config.outliers.window_size = 20;
    bundle.annotate(&config).unwrap();

    let key = "nbody:PyPy:default-python";
    assert_eq!(bundle.common_outliers[key], vec![vec![42], vec![42]]);
    assert_eq!(
        bundle.unique_outliers[key],
        vec![Vec::<usize>::new(), Vec::new()]
    );

    let summary = OutlierSummary::from_bundles(&[bundle]).unwrap();
    assert_eq!(summary.benchmarks["nbody"], 2);
}

#[test]
fn test_constant_bootstrap() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let estimate =
        bootstrap_steady_perf(&[vec![vec![2.0, 2.0, 2.0]]], 0.99, Quality::Low, &mut rng).unwrap();
    assert_eq!(estimate.median, 2.0);
    assert_eq!(estimate.ci, 0.0);
}

#[test]
fn test_annotated_bundle_survives_json() {
    let mut bundle = ResultsBundle::from_json(&bundle_json(&[step_down(), vec![1.0; 200]])).unwrap();
    let config = warmup_config();
    assert!(bundle.is_stale(&config));
    bundle.annotate(&config).unwrap();
    assert!(!bundle.is_stale(&config));

    let reloaded = ResultsBundle::from_json(&bundle.to_json(false).unwrap()).unwrap();
    assert_eq!(reloaded, bundle);
    assert!(!reloaded.is_stale(&config));

    let mut other = config.clone();
    other.outliers.threshold = 2;
    assert!(reloaded.is_stale(&other));

    // Summaries from the cache and from scratch agree
    let cached = summarise(&reloaded, &config).unwrap();
    let fresh = summarise(
        &ResultsBundle::from_json(&bundle_json(&[step_down(), vec![1.0; 200]])).unwrap(),
        &config,
    )
    .unwrap();
    assert_eq!(cached.machines, fresh.machines);
    assert_eq!(
        cached.machines["bencher3"]["PyPy"]["nbody"].classification,
        ReportedClassification::GoodInconsistent
    );
}

#[test]
fn test_summary_document_round_trip() {
    let bundle = ResultsBundle::from_json(&bundle_json(&[step_down()])).unwrap();
    let document = summarise(&bundle, &warmup_config()).unwrap();

    let json = serde_json::to_string_pretty(&document).unwrap();
    assert!(json.contains("\"warmup_format_version\": \"2\""));
    assert_eq!(SummaryDocument::from_json(&json).unwrap(), document);
}

#[test]
fn test_crashed_benchmarks_are_skipped() {
    let json = serde_json::json!({
        "wallclock_times": {
            "nbody:PyPy:default-python": [[1.0, 1.0, 1.0, 1.0]],
            "fannkuch:PyPy:default-python": [[]],
            "richards:PyPy:default-python": [],
        }
    })
    .to_string();
    let mut bundle = ResultsBundle::from_json(&json).unwrap();
    bundle.annotate(&Config::default()).unwrap();
    assert_eq!(bundle.classifications.len(), 1);

    let document = summarise(&bundle, &Config::default()).unwrap();
    assert_eq!(document.benchmark_count(), 1);

    let tally = tally_by_threshold(&[bundle], &[25]).unwrap();
    assert!(tally.0[&25].is_empty());
}
