//! Summarise a results bundle with the default settings
//!
//! Usage: cargo run -p steady-state --example summarise_bundle -- <results.json>

use anyhow::{Context, Result};
use std::env;
use steady_state::{summarise, Config, OutputFormat, Reporter, ResultsBundle};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let bundle_path = args
        .get(1)
        .context("Usage: summarise_bundle <results.json>")?;

    println!("Loading results from: {}", bundle_path);
    let mut bundle = ResultsBundle::from_file(bundle_path)?;
    let config = Config::default();

    println!("  Benchmarks: {}", bundle.wallclock_times.len());
    println!("  Machine: {}", bundle.machine_name().unwrap_or_default());
    println!();

    if bundle.is_stale(&config) {
        bundle.annotate(&config)?;
    }
    let document = summarise(&bundle, &config)?;

    // Print results
    let reporter = Reporter::new(OutputFormat::Console);
    reporter.report(&document)?;

    Ok(())
}
