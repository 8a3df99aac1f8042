//! Ground-truth label detection and stripping (loader side).

use super::{FlowError, FlowRecord};
use serde_json::{Map, Value};

const EXACT_LABEL_KEYS: &[&str] = &["groundtruth", "truelabel", "class", "attackcat"];

fn compact(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// True when `key` names a ground-truth label column or something derived from one.
pub fn is_label_key(key: &str) -> bool {
    let k = compact(key);
    k.contains("label") || EXACT_LABEL_KEYS.contains(&k.as_str())
}

/// Split one dataset row into a label-free record and its label.
///
/// The `label_column` value is returned as the label; every other label-shaped
/// column is dropped as well so nothing label-like reaches the pipeline.
pub fn split_label(row: Value, label_column: &str) -> Result<(FlowRecord, Option<String>), FlowError> {
    let Value::Object(mut map) = row else {
        return Err(FlowError::NotAnObject);
    };
    let label = map.remove(label_column).and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    });
    let features: Map<String, Value> = map
        .into_iter()
        .filter(|(k, _)| !is_label_key(k))
        .filter(|(_, v)| !v.is_null())
        .collect();
    Ok((FlowRecord::new(features)?, label))
}
