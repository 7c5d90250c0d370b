//! Console reporter for summary documents
//!
//! Provides human-readable output: one table per machine and VM, one row per
//! benchmark.

use anyhow::Result;
use std::fmt::Write;

use crate::classify::{Classification, ReportedClassification};
use crate::summary::{SteadyStateSummary, SummaryDocument};

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Format a summary document for console output
    pub fn format(document: &SummaryDocument) -> Result<String> {
        let mut output = String::new();

        // Header
        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                    STEADY-STATE SUMMARY                       ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;
        writeln!(output, "Generated: {}", document.generated_at.to_rfc3339())?;
        writeln!(output, "Format:    {}", document.warmup_format_version)?;
        writeln!(output)?;

        for (machine, vms) in &document.machines {
            for (vm, benchmarks) in vms {
                writeln!(output, "────────────────────────────────────────────────────────────────")?;
                writeln!(output, "Machine: {}   VM: {}", machine, vm)?;
                writeln!(output, "────────────────────────────────────────────────────────────────")?;
                writeln!(
                    output,
                    "  {:<20} {:<28} {:<22} {:<26} {}",
                    "Benchmark", "Class", "Steady iter (#)", "Steady iter (s)", "Steady perf (s)"
                )?;
                for (name, summary) in benchmarks {
                    Self::format_row(&mut output, name, summary)?;
                }
                writeln!(output)?;
            }
        }

        Ok(output)
    }

    fn format_row(output: &mut String, name: &str, summary: &SteadyStateSummary) -> Result<()> {
        writeln!(
            output,
            "  {:<20} {:<28} {:<22} {:<26} {}",
            name,
            Self::format_class(summary),
            Self::format_median(
                summary.steady_state_iteration,
                summary.steady_state_iteration_iqr,
                0
            ),
            Self::format_median(
                summary.steady_state_time_to_reach_secs,
                summary.steady_state_time_to_reach_secs_iqr,
                3
            ),
            match (summary.steady_state_time, summary.steady_state_time_ci) {
                (Some(time), Some(ci)) => format!("{:.5} ± {:.6}", time, ci),
                _ => "-".to_string(),
            }
        )?;
        Ok(())
    }

    /// Reported class, with per-category counts when executions disagreed or
    /// some could not be classified.
    fn format_class(summary: &SteadyStateSummary) -> String {
        let counts = &summary.detailed_classification;
        let partial = counts.get(Classification::CouldNotClassify) > 0
            && summary.classification
                != ReportedClassification::Consistent(Classification::CouldNotClassify);
        if !summary.classification.is_inconsistent() && !partial {
            return summary.classification.to_string();
        }
        let detail: Vec<String> = counts
            .non_zero()
            .map(|(class, count)| format!("{}{}", count, abbreviation(class)))
            .collect();
        format!("{} ({})", summary.classification, detail.join(", "))
    }

    fn format_median(median: Option<f64>, iqr: Option<(f64, f64)>, precision: usize) -> String {
        match (median, iqr) {
            (Some(median), Some((low, high))) => format!(
                "{:.*} ({:.*}, {:.*})",
                precision, median, precision, low, precision, high
            ),
            (Some(median), None) => format!("{:.*}", precision, median),
            _ => "-".to_string(),
        }
    }
}

fn abbreviation(class: Classification) -> &'static str {
    match class {
        Classification::Flat => "F",
        Classification::Warmup => "W",
        Classification::Slowdown => "S",
        Classification::NoSteadyState => "N",
        Classification::CouldNotClassify => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures::{sample_document, warmup_summary};

    #[test]
    fn test_console_format_contains_header() {
        let output = ConsoleReporter::format(&sample_document()).unwrap();

        assert!(output.contains("STEADY-STATE SUMMARY"));
        assert!(output.contains("Machine: bencher3   VM: PyPy"));
    }

    #[test]
    fn test_console_row() {
        let output = ConsoleReporter::format(&sample_document()).unwrap();

        assert!(output.contains("nbody"));
        assert!(output.contains("good inconsistent (1F, 1W)"));
        assert!(output.contains("51 (6, 96)"));
        assert!(output.contains("500.000 (50.000, 950.000)"));
        assert!(output.contains("1.00000 ± 0.012500"));
    }

    #[test]
    fn test_console_missing_statistics() {
        let mut summary = warmup_summary();
        summary.classification = ReportedClassification::Consistent(Classification::Flat);
        summary.steady_state_iteration = None;
        summary.steady_state_iteration_iqr = None;
        summary.steady_state_time = None;
        assert_eq!(ConsoleReporter::format_class(&summary), "flat");

        let mut output = String::new();
        ConsoleReporter::format_row(&mut output, "fasta", &summary).unwrap();
        assert!(output.contains("fasta"));
        assert!(output.trim_end().ends_with('-'));
    }
}
