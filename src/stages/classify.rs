//! Threat intelligence: retrieval-backed verdict on the normalized event.

use super::{require, Stage};
use crate::contract;
use crate::error::{PipelineError, StageName};
use crate::model::ModelInvoker;
use crate::pipeline::{PipelineState, ThreatReport, Verdict};
use crate::retrieval::VectorRetriever;
use std::sync::Arc;
use tracing::{debug, warn};

const INSTRUCTION: &str = "You are an expert SOC analyst. Reason like a human analyst: \
do not classify immediately. First derive detection heuristics from the reference \
examples, then compare the observed event against them. Most traffic is benign. \
Return JSON only.";

/// Labeled anchors. Durations in microseconds as captured.
const EXEMPLARS: &str = "\
Example 1 (benign):
flow_duration=476608us destination_port=80 protocol=6 total_forward_packets=5 \
total_backward_packets=3 flow_bytes_per_second=1405.77 flow_packets_per_second=16.79 \
syn_flag=0 ack_flag=0 max_idle_value=0
label=benign

Example 2 (benign):
flow_duration=2094us destination_port=49906 protocol=6 total_forward_packets=2 \
total_backward_packets=1 flow_bytes_per_second=18147.09 flow_packets_per_second=1432.66 \
syn_flag=1 ack_flag=1 max_idle_value=0
label=benign

Example 3 (FTP Brute Force):
flow_duration=2us destination_port=21 protocol=6 total_forward_packets=1 \
total_backward_packets=1 flow_bytes_per_second=0 flow_packets_per_second=1000000 \
syn_flag=0 ack_flag=0 max_idle_value=0
label=FTP Brute Force

Example 4 (SSH Brute Force):
flow_duration=353159us destination_port=22 protocol=6 total_forward_packets=1 \
total_backward_packets=1 flow_bytes_per_second=0 flow_packets_per_second=333333.33 \
syn_flag=0 ack_flag=1 max_idle_value=0
label=SSH Brute Force";

const NO_CONTEXT: &str = "(no supporting context retrieved)";

fn task(context: &str, event_json: &str) -> String {
    format!(
        "REFERENCE EXAMPLES\n{EXEMPLARS}\n\n\
THREAT KNOWLEDGE (advisory, not ground truth)\n{context}\n\n\
Tasks:\n\
- Classify the event as benign or malicious.\n\
- If malicious, name the most relevant attack type (e.g. SSH Brute Force, FTP Brute Force).\n\
- Give a confidence score from 0 to 100.\n\n\
Step 1, silently: what marks benign traffic; what marks DoS; what separates brute force \
from DoS and from port scans; which duration and packet-rate ranges are normal.\n\
Step 2, silently: decide which heuristics the observed event matches or does not match.\n\n\
Observed event:\n{event_json}\n\n\
Output ONLY this JSON object, no markdown, no code fences:\n\
{{\"label\": \"benign or malicious\", \"attack_type\": \"...\", \"confidence\": 0, \
\"reasoning\": \"security reasoning citing heuristics and evidence\"}}"
    )
}

pub struct Classify {
    invoker: Arc<ModelInvoker>,
    retriever: Arc<VectorRetriever>,
    top_k: usize,
}

impl Classify {
    pub fn new(invoker: Arc<ModelInvoker>, retriever: Arc<VectorRetriever>, top_k: usize) -> Self {
        Self {
            invoker,
            retriever,
            top_k,
        }
    }

    /// Retrieval never fails the stage: errors and empty corpora both give no context.
    fn context_for(&self, query: &str) -> String {
        match self.retriever.retrieve(query, self.top_k) {
            Ok(result) if !result.is_empty() => {
                debug!(hits = result.len(), top_score = result.hits[0].score, "context retrieved");
                result
                    .texts()
                    .enumerate()
                    .map(|(i, t)| format!("[{}] {}", i + 1, t))
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Ok(_) => NO_CONTEXT.to_string(),
            Err(e) => {
                warn!(error = %e, "retrieval failed; classifying without context");
                NO_CONTEXT.to_string()
            }
        }
    }
}

impl Stage for Classify {
    fn name(&self) -> StageName {
        StageName::Classify
    }

    fn apply(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let event = require(state.normalized_event(), StageName::Classify, "normalized_event")?;
        let event_json = serde_json::to_string_pretty(event).unwrap_or_else(|_| "{}".to_string());
        let context = self.context_for(&event_json);

        let mut report: ThreatReport =
            self.invoker
                .invoke(&contract::CLASSIFY, INSTRUCTION, &task(&context, &event_json))?;
        if report.label == Verdict::Benign && report.attack_type.is_empty() {
            report.attack_type = "none".to_string();
        }
        state.set_threat_report(report)?;
        Ok(state)
    }
}
