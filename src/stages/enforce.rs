//! Simulated enforcement. Nothing here touches a real network device.

use super::{require, Stage};
use crate::contract;
use crate::error::{PipelineError, StageName};
use crate::model::ModelInvoker;
use crate::pipeline::{EnforcementResult, EnforcementStatus, PipelineState};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

pub const UNKNOWN_TARGET: &str = "unknown";

const SOURCE_KEYS: &[&str] = &[
    "srcip",
    "sourceip",
    "sourceaddress",
    "srcaddr",
    "srcaddress",
    "sourceipaddress",
];

const INSTRUCTION: &str = "You are a security enforcement automation agent. Give the action \
to take against the target named in the incident, the mechanism that carries it out, and the \
concrete steps for this intrusion or threat.";

/// Source-address-like field of the normalized event, or `"unknown"`.
pub fn extract_target(event: &Map<String, Value>) -> String {
    event
        .iter()
        .find(|(k, _)| {
            let compact: String = k
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            SOURCE_KEYS.contains(&compact.as_str())
        })
        .and_then(|(_, v)| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| UNKNOWN_TARGET.to_string())
}

fn task(decision_json: &str, target: &str, response: &str) -> String {
    format!(
        "Incident details:\n{decision_json}\n\
- Source IP: {target}\n\
- Response decision: {response}\n\n\
Tasks:\n\
- Simulate the enforcement action.\n\
- Describe firewall, IAM or SOAR style commands or steps.\n\n\
Return ONLY this JSON object, no markdown, no code fences:\n\
{{\"action\": \"block_ip | alert | isolate_host | none\", \"target\": \"{target}\", \
\"mechanism\": \"firewall | IAM | SOAR\", \"detail\": \"...\", \
\"status\": \"simulated\"}}"
    )
}

pub struct Enforce {
    invoker: Arc<ModelInvoker>,
}

impl Enforce {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }
}

impl Stage for Enforce {
    fn name(&self) -> StageName {
        StageName::Enforce
    }

    fn apply(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let decision = require(state.response_decision(), StageName::Enforce, "response_decision")?;
        let event = require(state.normalized_event(), StageName::Enforce, "normalized_event")?;
        let target = extract_target(event);
        let decision_json = serde_json::to_string_pretty(decision).unwrap_or_else(|_| "{}".to_string());
        let task = task(&decision_json, &target, decision.response.as_str());

        let mut result: EnforcementResult =
            self.invoker.invoke(&contract::ENFORCE, INSTRUCTION, &task)?;
        result.target = target;
        if result.status == EnforcementStatus::Executed {
            warn!(target = %result.target, "backend claimed execution; recorded as simulated");
            result.status = EnforcementStatus::Simulated;
        }
        state.set_enforcement_result(result)?;
        Ok(state)
    }
}
