//! Network flow records: the unit of classification.

mod label;

pub use label::{is_label_key, split_label};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Canonical features Normalize must keep whenever the raw record has them.
pub const CANONICAL_FIELDS: &[&str] = &[
    "destination_port",
    "protocol",
    "flow_duration",
    "total_forward_packets",
    "total_backward_packets",
    "flow_bytes_per_second",
    "flow_packets_per_second",
    "syn_flag",
    "ack_flag",
    "max_idle_value",
];

#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("feature `{0}` is not a number or string")]
    NonScalar(String),
    #[error("flow row is not a JSON object")]
    NotAnObject,
}

/// One observed flow: feature name → number or string, in source column order.
/// There are no mutating accessors; a record is fixed once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct FlowRecord {
    features: Map<String, Value>,
}

impl FlowRecord {
    pub fn new(features: Map<String, Value>) -> Result<Self, FlowError> {
        for (k, v) in &features {
            if !matches!(v, Value::Number(_) | Value::String(_)) {
                return Err(FlowError::NonScalar(k.clone()));
            }
        }
        Ok(Self { features })
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self, FlowError>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.features.get(key)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.features
    }

    /// First label-shaped key, if any.
    pub fn label_key(&self) -> Option<&str> {
        self.keys().find(|k| is_label_key(k))
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.features).unwrap_or_else(|_| "{}".to_string())
    }
}

impl TryFrom<Map<String, Value>> for FlowRecord {
    type Error = FlowError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::new(map)
    }
}

impl From<FlowRecord> for Map<String, Value> {
    fn from(r: FlowRecord) -> Self {
        r.features
    }
}
