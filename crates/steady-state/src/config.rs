//! Configuration parsing for steady-state analysis
//!
//! This module provides TOML-based configuration for the analysis
//! parameters: the outlier window and threshold, the changepoint penalty,
//! the classification `delta`, and the bootstrap settings.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Values are validated eagerly by [`Config::from_str`] so that a bad
//! setting is reported before any data is processed.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::bootstrap::Quality;
use crate::error::StatsError;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sliding-window outlier detection
    #[serde(default)]
    pub outliers: OutlierConfig,
    /// Changepoint search
    #[serde(default)]
    pub changepoints: ChangepointConfig,
    /// Per-execution classification
    #[serde(default)]
    pub classification: ClassificationConfig,
    /// Bootstrap confidence intervals
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - A value fails validation
    ///
    /// # Example
    ///
    /// ```no_run
    /// use steady_state::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("warmup.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use steady_state::config::{Config, Delta};
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let toml = r#"
    ///     [outliers]
    ///     window_size = 100
    ///
    ///     [classification]
    ///     delta = "1%"
    /// "#;
    /// let config = Config::from_str(toml)?;
    /// assert_eq!(config.classification.delta, Delta::Percent(1.0));
    /// # Ok(())
    /// # }
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value is in range.
    pub fn validate(&self) -> Result<(), StatsError> {
        if self.outliers.window_size < 2 {
            return Err(StatsError::InvalidConfig(format!(
                "outliers.window_size must be at least 2, got {}",
                self.outliers.window_size
            )));
        }
        if self.outliers.threshold < 1 {
            return Err(StatsError::InvalidConfig(
                "outliers.threshold must be at least 1".to_string(),
            ));
        }
        if !(self.changepoints.penalty_multiplier > 0.0) {
            return Err(StatsError::InvalidConfig(format!(
                "changepoints.penalty_multiplier must be positive, got {}",
                self.changepoints.penalty_multiplier
            )));
        }
        self.classification.delta.validate()?;
        confidence_ppm(self.bootstrap.confidence)?;
        Ok(())
    }

    /// Parameters that determine the cached per-execution annotations.
    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            window_size: self.outliers.window_size,
            threshold: self.outliers.threshold,
            penalty_multiplier: self.changepoints.penalty_multiplier,
            delta: self.classification.delta,
            steady_state_window: self.classification.steady_state_window,
        }
    }
}

/// Sliding-window outlier settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Width of the sliding window (default: 200, minimum 2)
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Sibling executions that must share an outlier for it to be common (default: 1)
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            threshold: default_threshold(),
        }
    }
}

fn default_window_size() -> usize {
    200
}

fn default_threshold() -> usize {
    1
}

/// Changepoint search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangepointConfig {
    /// Multiplier `k` of the `k * ln(n)` changepoint penalty (default: 15.0)
    #[serde(default = "default_penalty_multiplier")]
    pub penalty_multiplier: f64,
}

impl Default for ChangepointConfig {
    fn default() -> Self {
        Self {
            penalty_multiplier: default_penalty_multiplier(),
        }
    }
}

fn default_penalty_multiplier() -> f64 {
    crate::changepoint::DEFAULT_PENALTY_MULTIPLIER
}

/// Classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Segments within `delta` of the steady level are equivalent (default: 0.001s)
    #[serde(default)]
    pub delta: Delta,
    /// Minimum iterations a steady state must last, or `0` for no minimum (default: 0)
    #[serde(default = "default_steady_state_window")]
    pub steady_state_window: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            delta: Delta::default(),
            steady_state_window: default_steady_state_window(),
        }
    }
}

fn default_steady_state_window() -> usize {
    0
}

/// Bootstrap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Confidence level of the reported interval (default: 0.99)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Resampling quality (default: HIGH)
    #[serde(default)]
    pub quality: Quality,
    /// Seed for reproducible resampling; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            quality: Quality::default(),
            seed: None,
        }
    }
}

fn default_confidence() -> f64 {
    0.99
}

/// Convert a confidence level to parts per million.
///
/// Interval indices are computed in integer arithmetic from this value, so a
/// level like 0.99 selects exactly the same order statistics for every
/// resample count.
pub fn confidence_ppm(confidence: f64) -> Result<u64, StatsError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(StatsError::InvalidConfig(format!(
            "confidence must be strictly between 0 and 1, got {}",
            confidence
        )));
    }
    let ppm = (confidence * 1_000_000.0).round();
    if ppm <= 0.0 || ppm >= 1_000_000.0 {
        return Err(StatsError::InvalidConfig(format!(
            "confidence {} is too close to 0 or 1",
            confidence
        )));
    }
    Ok(ppm as u64)
}

/// Tolerance used when comparing segment means.
///
/// Either an absolute time in seconds, or a percentage of the fastest
/// segment mean of the benchmark being classified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DeltaRepr", into = "DeltaRepr")]
pub enum Delta {
    Absolute(f64),
    Percent(f64),
}

impl Default for Delta {
    fn default() -> Self {
        Delta::Absolute(0.001)
    }
}

impl Delta {
    /// Absolute delta for a benchmark whose fastest segment mean is `fastest_mean`.
    ///
    /// # Examples
    ///
    /// ```
    /// use steady_state::config::Delta;
    ///
    /// assert_eq!(Delta::Absolute(0.5).resolve(10.0), 0.5);
    /// assert_eq!(Delta::Percent(10.0).resolve(2.0), 0.2);
    /// ```
    pub fn resolve(&self, fastest_mean: f64) -> f64 {
        match *self {
            Delta::Absolute(value) => value,
            Delta::Percent(pc) => fastest_mean * pc / 100.0,
        }
    }

    fn validate(&self) -> Result<(), StatsError> {
        let value = match *self {
            Delta::Absolute(value) | Delta::Percent(value) => value,
        };
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(StatsError::InvalidConfig(format!(
                "delta must be a non-negative number, got {}",
                self
            )))
        }
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delta::Absolute(value) => write!(f, "{}", value),
            Delta::Percent(pc) => write!(f, "{}%", pc),
        }
    }
}

impl FromStr for Delta {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |text: &str| {
            text.trim()
                .parse::<f64>()
                .map_err(|_| StatsError::InvalidConfig(format!("invalid delta: '{}'", s)))
        };
        let delta = match s.strip_suffix('%') {
            Some(pc) => Delta::Percent(parse(pc)?),
            None => Delta::Absolute(parse(s)?),
        };
        delta.validate()?;
        Ok(delta)
    }
}

/// On-disk form of [`Delta`]: a bare number or a `"<n>%"` string.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DeltaRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<DeltaRepr> for Delta {
    type Error = StatsError;

    fn try_from(repr: DeltaRepr) -> Result<Self, Self::Error> {
        match repr {
            DeltaRepr::Number(value) => {
                let delta = Delta::Absolute(value);
                delta.validate()?;
                Ok(delta)
            }
            DeltaRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Delta> for DeltaRepr {
    fn from(delta: Delta) -> Self {
        match delta {
            Delta::Absolute(value) => DeltaRepr::Number(value),
            Delta::Percent(_) => DeltaRepr::Text(delta.to_string()),
        }
    }
}

/// The parameters baked into a bundle's cached annotations.
///
/// Annotations computed under different parameters are stale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub window_size: usize,
    pub threshold: usize,
    pub penalty_multiplier: f64,
    pub delta: Delta,
    pub steady_state_window: usize,
}
