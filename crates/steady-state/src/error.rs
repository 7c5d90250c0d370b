use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Cannot compute percentile of an empty window")]
    EmptyWindow,

    #[error("Percentile must be in the range [0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("Not enough usable data points: {usable} (need at least 2)")]
    InsufficientData { usable: usize },

    #[error("Final segment contains no non-outlier data")]
    NoSteadyData,

    #[error("{key}: expected {expected} entries in '{field}', found {found}")]
    MismatchedExecutions {
        key: String,
        field: String,
        expected: usize,
        found: usize,
    },

    #[error("{key}: cached annotation is inconsistent: {reason}")]
    CorruptAnnotation { key: String, reason: String },

    #[error("Invalid execution key: {0}")]
    InvalidKey(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported summary format: {0}")]
    UnsupportedFormat(String),
}
