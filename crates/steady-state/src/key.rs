//! Execution keys
//!
//! Every benchmark in a results bundle is identified by a
//! `benchmark:vm:variant` string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StatsError;

/// `(benchmark, VM, variant)` triple identifying one benchmark run.
///
/// # Examples
///
/// ```
/// use steady_state::key::ExecutionKey;
///
/// let key: ExecutionKey = "nbody:PyPy:default-python".parse().unwrap();
/// assert_eq!(key.benchmark, "nbody");
/// assert_eq!(key.vm, "PyPy");
/// assert_eq!(key.to_string(), "nbody:PyPy:default-python");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExecutionKey {
    pub benchmark: String,
    pub vm: String,
    pub variant: String,
}

impl ExecutionKey {
    pub fn new(
        benchmark: impl Into<String>,
        vm: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            vm: vm.into(),
            variant: variant.into(),
        }
    }
}

impl FromStr for ExecutionKey {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(':').collect();
        match fields.as_slice() {
            [benchmark, vm, variant]
                if !benchmark.is_empty() && !vm.is_empty() && !variant.is_empty() =>
            {
                Ok(Self::new(*benchmark, *vm, *variant))
            }
            _ => Err(StatsError::InvalidKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for ExecutionKey {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExecutionKey> for String {
    fn from(key: ExecutionKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.benchmark, self.vm, self.variant)
    }
}
