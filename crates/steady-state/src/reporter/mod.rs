//! Summary reporting
//!
//! This module handles formatting and outputting steady-state summaries as
//! machine-readable JSON or a human-readable console table.
//!
//! # Output Formats
//!
//! - **JSON**: The persisted summary document, compact
//! - **JSON (pretty)**: The same, indented
//! - **Console**: One row per benchmark
//!
//! # Example
//!
//! ```no_run
//! use steady_state::reporter::{OutputFormat, Reporter};
//! use steady_state::summary::SummaryDocument;
//!
//! # fn example(document: SummaryDocument) -> anyhow::Result<()> {
//! let reporter = Reporter::new(OutputFormat::Console);
//! reporter.report(&document)?;
//!
//! // Or write to a file
//! Reporter::new(OutputFormat::Json).write_to_file(&document, "summary.json")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::StatsError;
use crate::summary::SummaryDocument;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

/// Output format for summaries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format for machine parsing
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Console table
    #[default]
    Console,
}

impl FromStr for OutputFormat {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "json-pretty" => Ok(OutputFormat::JsonPretty),
            "console" => Ok(OutputFormat::Console),
            other => Err(StatsError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Reporter for summary documents
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    /// Create a new reporter with the specified output format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report a summary to stdout
    pub fn report(&self, document: &SummaryDocument) -> Result<()> {
        let output = self.format_document(document)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }

    /// Write a summary to a file
    pub fn write_to_file<P: AsRef<Path>>(&self, document: &SummaryDocument, path: P) -> Result<()> {
        let output = self.format_document(document)?;
        fs::write(path, output)?;
        Ok(())
    }

    /// Format a summary as a string
    pub fn format_document(&self, document: &SummaryDocument) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(document, false),
            OutputFormat::JsonPretty => JsonReporter::format(document, true),
            OutputFormat::Console => ConsoleReporter::format(document),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}
