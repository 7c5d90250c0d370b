//! Warmup statistics CLI
//!
//! Annotates benchmark results bundles with outliers and changepoints, and
//! summarises whether and when each benchmark reached a steady state.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use steady_state::bootstrap::Quality;
use steady_state::config::Delta;
use steady_state::tally::{tally_by_threshold, OutlierSummary, DEFAULT_TALLY_WINDOWS};
use steady_state::{summarise, Config, OutputFormat, Reporter, ResultsBundle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "warmup-stats")]
#[command(version, about = "Steady-state analysis of benchmark results")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Analysis settings given on the command line, taking precedence over the
/// configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sliding window size for outlier detection
    #[arg(long, global = true)]
    window: Option<usize>,

    /// Executions an outlier must appear in to count as common
    #[arg(long, global = true)]
    threshold: Option<usize>,

    /// Segment tolerance, in seconds or as a percentage (e.g. "1%")
    #[arg(long, global = true)]
    delta: Option<Delta>,

    /// Bootstrap quality: HIGH or LOW
    #[arg(long, global = true)]
    quality: Option<Quality>,

    /// Seed for bootstrap resampling
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl Overrides {
    fn load(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(window) = self.window {
            config.outliers.window_size = window;
        }
        if let Some(threshold) = self.threshold {
            config.outliers.threshold = threshold;
        }
        if let Some(delta) = self.delta {
            config.classification.delta = delta;
        }
        if let Some(quality) = self.quality {
            config.bootstrap.quality = quality;
        }
        if self.seed.is_some() {
            config.bootstrap.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate a bundle with outliers, changepoints and classifications
    MarkOutliers {
        /// Results bundle to annotate
        bundle: PathBuf,

        /// Where to write the annotated bundle
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarise the steady state of every benchmark in a bundle
    Summarize {
        /// Results bundle to summarise
        bundle: PathBuf,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report format: json, json-pretty or console
        #[arg(long, default_value = "console")]
        format: OutputFormat,
    },

    /// Count outliers for a range of window sizes and thresholds
    OutlierThresholds {
        /// Results bundles to tally
        #[arg(required = true)]
        bundles: Vec<PathBuf>,

        /// Window sizes to tally
        #[arg(long, value_delimiter = ',')]
        windows: Option<Vec<usize>>,
    },

    /// Count outliers per benchmark, VM and language variant
    OutlierSummary {
        /// Results bundles to count
        #[arg(required = true)]
        bundles: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries reports, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.overrides.load()?;

    match cli.command {
        Command::MarkOutliers { bundle, output } => mark_outliers(&bundle, &output, &config),
        Command::Summarize {
            bundle,
            output,
            format,
        } => summarize(&bundle, output.as_deref(), format, &config),
        Command::OutlierThresholds { bundles, windows } => {
            let windows = windows.unwrap_or_else(|| DEFAULT_TALLY_WINDOWS.to_vec());
            outlier_thresholds(&bundles, &windows)
        }
        Command::OutlierSummary { bundles } => outlier_summary(&bundles, &config),
    }
}

fn mark_outliers(input: &Path, output: &Path, config: &Config) -> Result<()> {
    let mut bundle = ResultsBundle::from_file(input)?;
    bundle
        .annotate(config)
        .with_context(|| format!("Failed to annotate {}", input.display()))?;
    bundle.write_to_file(output)?;
    tracing::info!("Wrote annotated bundle to {}", output.display());
    Ok(())
}

fn summarize(input: &Path, output: Option<&Path>, format: OutputFormat, config: &Config) -> Result<()> {
    let bundle = load_annotated(input, config)?;
    let document = summarise(&bundle, config)
        .with_context(|| format!("Failed to summarise {}", input.display()))?;
    tracing::info!("Summarised {} benchmarks", document.benchmark_count());

    let reporter = Reporter::new(format);
    match output {
        Some(path) => {
            reporter.write_to_file(&document, path)?;
            tracing::info!("Wrote summary to {}", path.display());
        }
        None => reporter.report(&document)?,
    }
    Ok(())
}

fn outlier_thresholds(inputs: &[PathBuf], windows: &[usize]) -> Result<()> {
    let bundles = inputs
        .iter()
        .map(ResultsBundle::from_file)
        .collect::<Result<Vec<_>>>()?;
    let tally = tally_by_threshold(&bundles, windows)?;
    println!("{}", serde_json::to_string_pretty(&tally)?);
    Ok(())
}

fn outlier_summary(inputs: &[PathBuf], config: &Config) -> Result<()> {
    let bundles = inputs
        .iter()
        .map(|path| load_annotated(path, config))
        .collect::<Result<Vec<_>>>()?;
    let summary = OutlierSummary::from_bundles(&bundles)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Load a bundle, re-annotating it when its cached annotation is missing or
/// was made with other parameters.
fn load_annotated(path: &Path, config: &Config) -> Result<ResultsBundle> {
    let mut bundle = ResultsBundle::from_file(path)?;
    if bundle.is_stale(config) {
        tracing::info!("Annotation of {} is missing or stale", path.display());
        bundle
            .annotate(config)
            .with_context(|| format!("Failed to annotate {}", path.display()))?;
    }
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_take_precedence() {
        let cli = Cli::parse_from([
            "warmup-stats",
            "--window",
            "50",
            "--delta",
            "2%",
            "--quality",
            "low",
            "--seed",
            "7",
            "summarize",
            "results.json",
        ]);
        let config = cli.overrides.load().unwrap();

        assert_eq!(config.outliers.window_size, 50);
        assert_eq!(config.classification.delta, Delta::Percent(2.0));
        assert_eq!(config.bootstrap.quality, Quality::Low);
        assert_eq!(config.bootstrap.seed, Some(7));
        assert_eq!(config.outliers.threshold, 1);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = Overrides {
            window: Some(1),
            ..Overrides::default()
        };
        assert!(overrides.load().is_err());
    }

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::parse_from([
            "warmup-stats",
            "outlier-thresholds",
            "a.json",
            "b.json",
            "--windows",
            "25,50",
        ]);
        match cli.command {
            Command::OutlierThresholds { bundles, windows } => {
                assert_eq!(bundles.len(), 2);
                assert_eq!(windows, Some(vec![25, 50]));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
