//! Event processing: pick a compact, security-relevant feature subset.

use super::Stage;
use crate::contract;
use crate::error::{PipelineError, StageName};
use crate::flow::CANONICAL_FIELDS;
use crate::model::ModelInvoker;
use crate::pipeline::PipelineState;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

const INSTRUCTION: &str = "You are a cybersecurity data processing agent. You clean raw \
network flow data and keep only the features that matter for intrusion detection. \
You answer with a single valid JSON object and nothing else.";

const TARGET_KEYS: std::ops::RangeInclusive<usize> = 10..=15;

fn task(raw_json: &str) -> String {
    format!(
        "Raw network flow record:\n{raw_json}\n\n\
Tasks:\n\
- Select 10-15 features relevant to intrusion detection.\n\
- If present in the raw record, ALWAYS keep: {canonical}.\n\
- Normalize units: durations in milliseconds.\n\
- Drop irrelevant or noisy features.\n\
- Use descriptive, security-relevant snake_case key names.\n\n\
Rules:\n\
- Values must be numbers or strings.\n\
- Never include any ground-truth label or class field.\n\
- Return ONLY the JSON object: no markdown, no code fences, no explanation.",
        canonical = CANONICAL_FIELDS.join(", "),
    )
}

pub struct Normalize {
    invoker: Arc<ModelInvoker>,
}

impl Normalize {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }
}

impl Stage for Normalize {
    fn name(&self) -> StageName {
        StageName::Normalize
    }

    fn apply(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let task = task(&state.raw_features().to_pretty_json());
        let event: Map<String, Value> =
            self.invoker
                .invoke(&contract::NORMALIZE, INSTRUCTION, &task)?;
        if !TARGET_KEYS.contains(&event.len()) {
            warn!(keys = event.len(), "normalized event outside the 10-15 key target");
        }
        debug!(keys = event.len(), "event normalized");
        state.set_normalized_event(event)?;
        Ok(state)
    }
}
