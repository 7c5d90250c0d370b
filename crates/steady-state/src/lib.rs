//! Steady-state analysis for benchmark timing data
//!
//! This crate decides whether, and when, repeated in-process iterations of a
//! benchmark reach a steady state of performance, and summarises how long
//! that took and how fast the benchmark ran afterwards.
//!
//! # Features
//!
//! - **Outlier Detection**: Sliding-window Tukey fences, split into outliers
//!   common to several process executions and those unique to one
//! - **Changepoint Segmentation**: PELT over a normal mean/variance cost
//! - **Classification**: flat, warmup, slowdown or no steady state, per process
//!   execution and aggregated per benchmark
//! - **Bootstrap Confidence Intervals**: Seedable resampling of steady-state
//!   performance across process executions
//! - **Multiple Output Formats**: JSON and Console reports
//!
//! # Example
//!
//! ```no_run
//! use steady_state::{bundle::ResultsBundle, summarise, Config, OutputFormat, Reporter};
//!
//! # fn example() -> anyhow::Result<()> {
//! // Load configuration
//! let config = Config::from_file("warmup.toml")?;
//!
//! // Annotate a results bundle with outliers and changepoints
//! let mut bundle = ResultsBundle::from_file("results.json")?;
//! bundle.annotate(&config)?;
//!
//! // Summarise and report
//! let document = summarise(&bundle, &config)?;
//! Reporter::new(OutputFormat::Console).report(&document)?;
//!
//! // Or save to file
//! Reporter::new(OutputFormat::Json).write_to_file(&document, "summary.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Analysis parameters are configured using TOML files. Every field is
//! optional:
//!
//! ```toml
//! [outliers]
//! window_size = 200
//! threshold = 1
//!
//! [changepoints]
//! penalty_multiplier = 15.0
//!
//! [classification]
//! delta = 0.001
//! steady_state_window = 0
//!
//! [bootstrap]
//! confidence = 0.99
//! quality = "HIGH"
//! seed = 42
//! ```

pub mod analysis;
pub mod bootstrap;
pub mod bundle;
pub mod changepoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod instruments;
pub mod key;
pub mod reporter;
pub mod stats;
pub mod summary;
pub mod tally;

// Re-export main types for convenience
pub use bundle::ResultsBundle;
pub use classify::{Classification, ReportedClassification};
pub use config::Config;
pub use error::StatsError;
pub use key::ExecutionKey;
pub use reporter::{OutputFormat, Reporter};
pub use summary::{summarise, SteadyStateSummary, SummaryDocument};
