//! VM instrumentation parsers
//!
//! Some VMs can be instrumented to log internal events alongside each
//! iteration's timing. Parsers turn those raw events into per-iteration
//! series that can be plotted or compared against the run sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StatsError;

/// One per-iteration series derived from instrumentation data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub title: String,
    pub data: Vec<f64>,
    pub legend: String,
}

/// VMs with an instrumentation parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmKind {
    /// Oracle Hotspot.
    ///
    /// Each iteration logs `[iter_num, cumulative_ms, collector_info]`, e.g.
    /// `[0, 17, [["PS Scavenge", ["PS Eden Space"], 0, 0]]]`.
    Hotspot,
}

impl VmKind {
    /// Parser for the VM named in an execution key, if there is one.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Hotspot" => Some(VmKind::Hotspot),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VmKind::Hotspot => "Hotspot",
        }
    }

    /// Parse the raw events of every process execution.
    ///
    /// Returns one list of series per process execution.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError::UnsupportedFormat`] if an event does not have the
    /// expected shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use steady_state::instruments::VmKind;
    ///
    /// let pexec = vec![json!([0, 17, []]), json!([1, 20, []]), json!([2, 20, []])];
    /// let series = VmKind::Hotspot.parse(&[pexec]).unwrap();
    /// assert_eq!(series[0][0].data, vec![0.017, 0.003, 0.0]);
    /// ```
    pub fn parse(&self, raw_events: &[Vec<Value>]) -> Result<Vec<Vec<ChartSeries>>, StatsError> {
        match self {
            VmKind::Hotspot => raw_events
                .iter()
                .map(|events| hotspot_series(events).map(|series| vec![series]))
                .collect(),
        }
    }
}

/// Per-iteration seconds from Hotspot's cumulative millisecond counter.
fn hotspot_series(events: &[Value]) -> Result<ChartSeries, StatsError> {
    let cumulative = events
        .iter()
        .enumerate()
        .map(|(iteration, event)| {
            event.get(1).and_then(Value::as_f64).ok_or_else(|| {
                StatsError::UnsupportedFormat(format!(
                    "Hotspot event {} has no cumulative time: {}",
                    iteration, event
                ))
            })
        })
        .collect::<Result<Vec<f64>, _>>()?;

    let mut previous = 0.0;
    let data = cumulative
        .into_iter()
        .map(|total| {
            let secs = (total - previous) / 1000.0;
            previous = total;
            secs
        })
        .collect();

    Ok(ChartSeries {
        title: "GC (secs)".to_string(),
        data,
        legend: "GC events".to_string(),
    })
}
