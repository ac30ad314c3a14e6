//! Normalized benchmark sample
//!
//! A `Sample` is one (metric, value, unit, metadata) measurement. Samples are
//! immutable once built; the coordinator's sample builder is the only producer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat metadata mapping attached to a sample. Keys are unique.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for MetadataValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for MetadataValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Metadata key marking a sample whose value is a placeholder, not a reading
pub const MEASURED_KEY: &str = "measured";

/// One normalized measurement emitted by a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    metric: String,
    value: f64,
    unit: String,
    metadata: Metadata,
    /// Creation time in milliseconds since UNIX epoch
    timestamp_ms: i64,
}

impl Sample {
    /// Create a sample stamped with the current time
    pub fn new(
        metric: impl Into<String>,
        value: f64,
        unit: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            metric: metric.into(),
            value,
            unit: unit.into(),
            metadata,
            timestamp_ms: crate::timestamp_millis(),
        }
    }

    /// Metric name (e.g., "Throughput")
    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit string (e.g., "Mbits/sec")
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Environment and extraction facts
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Look up a metadata value by key
    pub fn meta(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.get(key)
    }

    /// False only when the producer flagged the value as a placeholder
    pub fn is_measured(&self) -> bool {
        !matches!(self.meta(MEASURED_KEY), Some(MetadataValue::Bool(false)))
    }
}
