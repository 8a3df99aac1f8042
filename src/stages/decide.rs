//! Response decision from the threat report alone.

use super::{require, Stage};
use crate::contract::{self, mentions};
use crate::error::{PipelineError, StageName};
use crate::model::ModelInvoker;
use crate::pipeline::{PipelineState, ResponseDecision};
use std::sync::Arc;

const INSTRUCTION: &str = "You are a SOC response decision agent. You decide how to respond \
to a threat using only the threat intelligence report you are given.";

fn task(report_json: &str) -> String {
    format!(
        "Threat intelligence report:\n{report_json}\n\n\
Tasks:\n\
- Decide the response: block, alert, monitor or ignore.\n\
- Justify the decision by risk, citing only fields of the report above.\n\n\
Rules:\n\
- You have no access to any ground truth; do not assume or mention one.\n\n\
Return ONLY this JSON object, no markdown, no code fences:\n\
{{\"response\": \"block | alert | monitor | ignore\", \"justification\": \"...\"}}"
    )
}

/// Raw and normalized feature names the report does not carry. The
/// justification may only cite what the report shows.
fn out_of_scope_terms(state: &PipelineState, report_json: &str) -> Vec<String> {
    let normalized = state.normalized_event().into_iter().flat_map(|m| m.keys().map(String::as_str));
    let mut terms: Vec<String> = Vec::new();
    for key in state.raw_features().keys().chain(normalized) {
        if !mentions(report_json, key) && !terms.iter().any(|t| t == key) {
            terms.push(key.to_string());
        }
    }
    terms
}

pub struct Decide {
    invoker: Arc<ModelInvoker>,
}

impl Decide {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }
}

impl Stage for Decide {
    fn name(&self) -> StageName {
        StageName::Decide
    }

    fn apply(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let report = require(state.threat_report(), StageName::Decide, "threat_report")?;
        let report_json = serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string());
        let out_of_scope = out_of_scope_terms(&state, &report_json);
        let decision: ResponseDecision = self.invoker.invoke_scoped(
            &contract::DECIDE,
            INSTRUCTION,
            &task(&report_json),
            &out_of_scope,
        )?;
        state.set_response_decision(decision)?;
        Ok(state)
    }
}
