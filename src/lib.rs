pub mod agent;
pub mod config;
pub mod server;
pub mod storage;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage::error::{StorageError, StorageResult};

/// The two supported metric kinds.
///
/// Gauges and counters have separate name spaces: the same name may
/// exist independently as a gauge and as a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Point-in-time value, last write wins.
    Gauge,

    /// Accumulating delta, writes add to the running total.
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(StorageError::UnsupportedKind(other.to_string())),
        }
    }
}

/// A validated metric value.
///
/// Every storage backend parses raw input through this type before
/// touching its own state, so validation behaves identically no matter
/// which backend is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    /// Parse a raw value according to the metric kind.
    ///
    /// Gauges accept any 64-bit float, counters any 64-bit signed
    /// integer. Anything else is an `InvalidValue` error.
    pub fn parse(kind: MetricKind, raw: &str) -> StorageResult<Self> {
        match kind {
            MetricKind::Gauge => raw
                .trim()
                .parse::<f64>()
                .map(MetricValue::Gauge)
                .map_err(|_| StorageError::InvalidValue(format!("not a float: {raw:?}"))),
            MetricKind::Counter => raw
                .trim()
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|_| StorageError::InvalidValue(format!("not an integer: {raw:?}"))),
        }
    }

    /// Canonical decimal rendering: floats without trailing zeros,
    /// integers as plain digits.
    pub fn format(&self) -> String {
        match self {
            MetricValue::Gauge(v) => format!("{v}"),
            MetricValue::Counter(d) => format!("{d}"),
        }
    }
}

/// Wire shape of a single metric update or query.
///
/// `value` carries gauge readings, `delta` counter increments; the
/// field matching `kind` is required on updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPayload {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: MetricKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl MetricPayload {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            value: Some(value),
            delta: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            value: None,
            delta: Some(delta),
        }
    }

    /// Extract the raw value string for this payload's kind.
    ///
    /// Fails with `InvalidValue` when the field required by the kind
    /// is missing.
    pub fn raw_value(&self) -> StorageResult<String> {
        match self.kind {
            MetricKind::Gauge => self.value.map(|v| format!("{v}")).ok_or_else(|| {
                StorageError::InvalidValue(format!("missing gauge value for {}", self.id))
            }),
            MetricKind::Counter => self.delta.map(|d| format!("{d}")).ok_or_else(|| {
                StorageError::InvalidValue(format!("missing counter delta for {}", self.id))
            }),
        }
    }
}
