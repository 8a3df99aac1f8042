//! Stage output contracts. Model text is untrusted: it is parsed here and
//! checked key by key before any stage reads a field from it.

mod extract;

pub use extract::extract_json_object;

use crate::error::StageName;
use crate::flow::is_label_key;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("response is not JSON: {0}")]
    NotJson(String),
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("response object is empty")]
    Empty,
    #[error("missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("`{key}` must be {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("`{key}` = {value:?} is not one of [{allowed}]")]
    NotAllowed {
        key: &'static str,
        value: String,
        allowed: String,
    },
    #[error("`{key}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("`{0}` must not be empty")]
    EmptyText(&'static str),
    #[error("`{key}` references `{term}`, which is not part of the stage input")]
    ForbiddenReference { key: &'static str, term: String },
    #[error("key `{0}` is label-shaped")]
    LabelKey(String),
    #[error("accepted object does not fit the stage output: {0}")]
    Shape(String),
}

#[derive(Debug)]
pub enum FieldKind {
    /// Free text. `forbidden` terms are matched as whole words, case-insensitively.
    /// A `scoped` field also rejects the out-of-scope terms supplied per call.
    Text {
        non_empty: bool,
        forbidden: &'static [&'static str],
        scoped: bool,
    },
    /// One of a closed set, matched case-insensitively and stored in canonical spelling.
    Choice(&'static [&'static str]),
    Number { min: f64, max: f64 },
}

#[derive(Debug)]
pub struct FieldSpec {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    /// Optional fields may be absent or null; they are then left out of the result.
    pub required: bool,
    pub kind: FieldKind,
}

#[derive(Debug)]
pub enum Shape {
    /// Non-empty object of scalar values with no label-shaped keys.
    ScalarMapping,
    /// Fixed set of required keys; unknown keys are dropped.
    Fields(&'static [FieldSpec]),
}

#[derive(Debug)]
pub struct StageContract {
    pub stage: StageName,
    pub shape: Shape,
}

/// Word sequences; `true_label`, `ground-truth` and similar spellings all match.
const GROUND_TRUTH_TERMS: &[&str] = &["true label", "ground truth"];

pub static NORMALIZE: StageContract = StageContract {
    stage: StageName::Normalize,
    shape: Shape::ScalarMapping,
};

pub static CLASSIFY: StageContract = StageContract {
    stage: StageName::Classify,
    shape: Shape::Fields(&[
        FieldSpec {
            key: "label",
            aliases: &["verdict"],
            required: true,
            kind: FieldKind::Choice(&["benign", "malicious"]),
        },
        FieldSpec {
            key: "attack_type",
            aliases: &["attackType", "attack type"],
            required: true,
            kind: FieldKind::Text {
                non_empty: false,
                forbidden: &[],
                scoped: false,
            },
        },
        FieldSpec {
            key: "confidence",
            aliases: &[],
            required: true,
            kind: FieldKind::Number { min: 0.0, max: 100.0 },
        },
        FieldSpec {
            key: "reasoning",
            aliases: &[],
            required: true,
            kind: FieldKind::Text {
                non_empty: true,
                forbidden: &[],
                scoped: false,
            },
        },
    ]),
};

pub static DECIDE: StageContract = StageContract {
    stage: StageName::Decide,
    shape: Shape::Fields(&[
        FieldSpec {
            key: "response",
            aliases: &[],
            required: true,
            kind: FieldKind::Choice(&["block", "alert", "monitor", "ignore"]),
        },
        FieldSpec {
            key: "justification",
            aliases: &[],
            required: true,
            kind: FieldKind::Text {
                non_empty: true,
                forbidden: GROUND_TRUTH_TERMS,
                scoped: true,
            },
        },
    ]),
};

pub static ENFORCE: StageContract = StageContract {
    stage: StageName::Enforce,
    shape: Shape::Fields(&[
        FieldSpec {
            key: "action",
            aliases: &[],
            required: true,
            kind: FieldKind::Choice(&["block_ip", "alert", "isolate_host", "none"]),
        },
        FieldSpec {
            key: "target",
            aliases: &[],
            required: false,
            kind: FieldKind::Text {
                non_empty: false,
                forbidden: &[],
                scoped: false,
            },
        },
        FieldSpec {
            key: "mechanism",
            aliases: &[],
            required: true,
            kind: FieldKind::Choice(&["firewall", "IAM", "SOAR"]),
        },
        FieldSpec {
            key: "detail",
            aliases: &["detailed action", "detailed_action"],
            required: true,
            kind: FieldKind::Text {
                non_empty: true,
                forbidden: &[],
                scoped: false,
            },
        },
        FieldSpec {
            key: "status",
            aliases: &[],
            required: true,
            kind: FieldKind::Choice(&["executed", "simulated", "failed"]),
        },
    ]),
};

/// Lowercase alphanumeric words of `text`; every other character separates.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// True when the words of `term` appear consecutively in `text`, ignoring case
/// and separators, so `Dst Port` matches `dst_port` but `ack` does not match
/// `attack`. A term without words never matches.
pub fn mentions(text: &str, term: &str) -> bool {
    let needle = words(term);
    if needle.is_empty() {
        return false;
    }
    words(text).windows(needle.len()).any(|w| w == needle.as_slice())
}

impl StageContract {
    /// Parse `raw` and check it against this contract. Returns the accepted
    /// object with canonical key names and enum spellings.
    pub fn validate(&self, raw: &str) -> Result<Map<String, Value>, ContractViolation> {
        self.validate_scoped(raw, &[])
    }

    /// Like [`validate`](Self::validate), and scoped text fields must not
    /// mention any of `out_of_scope`.
    pub fn validate_scoped(
        &self,
        raw: &str,
        out_of_scope: &[String],
    ) -> Result<Map<String, Value>, ContractViolation> {
        let body = extract_json_object(raw).ok_or(ContractViolation::NotAnObject)?;
        let value: Value =
            serde_json::from_str(body).map_err(|e| ContractViolation::NotJson(e.to_string()))?;
        let Value::Object(obj) = value else {
            return Err(ContractViolation::NotAnObject);
        };
        match &self.shape {
            Shape::ScalarMapping => check_scalar_mapping(obj),
            Shape::Fields(fields) => check_fields(fields, &obj, out_of_scope),
        }
    }
}

fn check_scalar_mapping(obj: Map<String, Value>) -> Result<Map<String, Value>, ContractViolation> {
    if obj.is_empty() {
        return Err(ContractViolation::Empty);
    }
    for (k, v) in &obj {
        if is_label_key(k) {
            return Err(ContractViolation::LabelKey(k.clone()));
        }
        if !matches!(v, Value::Number(_) | Value::String(_) | Value::Bool(_)) {
            return Err(ContractViolation::WrongType {
                key: k.clone(),
                expected: "a number, string or boolean",
            });
        }
    }
    Ok(obj)
}

fn lookup<'a>(obj: &'a Map<String, Value>, field: &FieldSpec) -> Option<&'a Value> {
    obj.get(field.key)
        .or_else(|| field.aliases.iter().find_map(|a| obj.get(*a)))
        .filter(|v| field.required || !v.is_null())
}

fn check_fields(
    fields: &[FieldSpec],
    obj: &Map<String, Value>,
    out_of_scope: &[String],
) -> Result<Map<String, Value>, ContractViolation> {
    let mut out = Map::new();
    for field in fields {
        let Some(value) = lookup(obj, field) else {
            if field.required {
                return Err(ContractViolation::MissingKey(field.key));
            }
            continue;
        };
        let accepted = check_value(field, value, out_of_scope)?;
        out.insert(field.key.to_string(), accepted);
    }
    Ok(out)
}

fn check_value(field: &FieldSpec, value: &Value, out_of_scope: &[String]) -> Result<Value, ContractViolation> {
    let key = field.key;
    match &field.kind {
        FieldKind::Text {
            non_empty,
            forbidden,
            scoped,
        } => {
            let s = value.as_str().ok_or(ContractViolation::WrongType {
                key: key.to_string(),
                expected: "a string",
            })?;
            if *non_empty && s.trim().is_empty() {
                return Err(ContractViolation::EmptyText(key));
            }
            let hit = forbidden
                .iter()
                .find(|t| mentions(s, t))
                .map(|t| t.to_string())
                .or_else(|| {
                    scoped
                        .then(|| out_of_scope.iter().find(|t| mentions(s, t)).cloned())
                        .flatten()
                });
            if let Some(term) = hit {
                return Err(ContractViolation::ForbiddenReference { key, term });
            }
            Ok(Value::String(s.trim().to_string()))
        }
        FieldKind::Choice(allowed) => {
            let s = value.as_str().ok_or(ContractViolation::WrongType {
                key: key.to_string(),
                expected: "a string",
            })?;
            let wanted = s.trim();
            allowed
                .iter()
                .find(|a| a.eq_ignore_ascii_case(wanted))
                .map(|a| Value::String(a.to_string()))
                .ok_or_else(|| ContractViolation::NotAllowed {
                    key,
                    value: s.to_string(),
                    allowed: allowed.join(", "),
                })
        }
        FieldKind::Number { min, max } => {
            let n = value.as_f64().ok_or(ContractViolation::WrongType {
                key: key.to_string(),
                expected: "a number",
            })?;
            if n < *min || n > *max {
                return Err(ContractViolation::OutOfRange {
                    key,
                    value: n,
                    min: *min,
                    max: *max,
                });
            }
            Ok(value.clone())
        }
    }
}
