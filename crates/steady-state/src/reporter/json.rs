//! JSON reporter for summary documents

use crate::summary::SummaryDocument;
use anyhow::Result;

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format a summary document as JSON
    ///
    /// # Arguments
    ///
    /// * `document` - The summary to format
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn format(document: &SummaryDocument, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(document)?
        } else {
            serde_json::to_string(document)?
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures::sample_document;

    #[test]
    fn test_json_format_compact() {
        let output = JsonReporter::format(&sample_document(), false).unwrap();

        // Compact JSON should not have newlines
        assert!(!output.contains('\n'));
        assert!(output.contains("\"warmup_format_version\":\"2\""));
    }

    #[test]
    fn test_json_format_pretty() {
        let output = JsonReporter::format(&sample_document(), true).unwrap();

        // Pretty JSON should have newlines and indentation
        assert!(output.contains('\n'));
        assert!(output.contains("  "));
    }

    #[test]
    fn test_json_uses_persisted_field_names() {
        let output = JsonReporter::format(&sample_document(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let nbody = &value["machines"]["bencher3"]["PyPy"]["nbody"];

        assert_eq!(nbody["classification"], "good inconsistent");
        assert_eq!(nbody["detailed_classification"]["warmup"], 1);
        assert_eq!(nbody["steady_state_iteration_iqr"], serde_json::json!([6.0, 96.0]));
        assert_eq!(nbody["steady_state_time_ci"], 0.0125);
        assert_eq!(nbody["process_executions"][0]["classification"], "warmup");
    }

    #[test]
    fn test_json_round_trip() {
        let document = sample_document();
        let output = JsonReporter::format(&document, true).unwrap();
        let parsed = SummaryDocument::from_json(&output).unwrap();
        assert_eq!(parsed, document);
    }
}
