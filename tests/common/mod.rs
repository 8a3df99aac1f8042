//! Stub backends and fixtures shared by the integration tests.

#![allow(dead_code)]

use flow_triage::model::{ModelBackend, ModelError, ModelInvoker, ModelRequest};
use flow_triage::pipeline::PipelineExecutor;
use flow_triage::retrieval::{default_corpus, HashingEmbedder, VectorRetriever};
use flow_triage::FlowRecord;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Timeout,
}

impl Reply {
    pub fn json(v: serde_json::Value) -> Self {
        Reply::Text(v.to_string())
    }

    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// Which stage a request came from, by the heading its task text opens with.
pub fn stage_of(task: &str) -> &'static str {
    if task.starts_with("Raw network flow record") {
        "normalize"
    } else if task.starts_with("REFERENCE EXAMPLES") {
        "classify"
    } else if task.starts_with("Threat intelligence report") {
        "decide"
    } else if task.starts_with("Incident details") {
        "enforce"
    } else {
        "unknown"
    }
}

/// Replies per stage in order; the last reply repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<HashMap<&'static str, Vec<Reply>>>,
    calls: Mutex<Vec<(&'static str, ModelRequest)>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, stage: &'static str, replies: Vec<Reply>) -> Self {
        self.script.lock().unwrap().insert(stage, replies);
        self
    }

    pub fn calls_for(&self, stage: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(s, _)| *s == stage).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.calls.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }
}

impl ModelBackend for ScriptedBackend {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let stage = stage_of(&request.task);
        let nth = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((stage, request.clone()));
            calls.iter().filter(|(s, _)| *s == stage).count() - 1
        };
        let script = self.script.lock().unwrap();
        let replies = script
            .get(stage)
            .unwrap_or_else(|| panic!("no script for stage {stage}"));
        match replies.get(nth).or_else(|| replies.last()) {
            Some(Reply::Text(t)) => Ok(t.clone()),
            Some(Reply::Timeout) => Err(ModelError::Timeout),
            None => panic!("empty script for stage {stage}"),
        }
    }
}

pub fn ssh_flow() -> FlowRecord {
    FlowRecord::from_pairs([
        ("Protocol", json!(6)),
        ("Dst Port", json!(22)),
        ("Flow Duration", json!(353159)),
        ("Tot Fwd Pkts", json!(1)),
        ("Tot Bwd Pkts", json!(1)),
        ("SYN", json!(0)),
        ("ACK", json!(1)),
    ])
    .unwrap()
}

pub fn benign_web_flow() -> FlowRecord {
    FlowRecord::from_pairs([
        ("Protocol", json!(6)),
        ("Dst Port", json!(80)),
        ("Flow Duration", json!(476608)),
        ("Tot Fwd Pkts", json!(5)),
        ("Tot Bwd Pkts", json!(3)),
        ("Flow Byts/s", json!(1405.7674231234)),
        ("Flow Pkts/s", json!(16.78528266)),
        ("SYN Flag Cnt", json!(0)),
        ("ACK Flag Cnt", json!(0)),
        ("Idle Max", json!(0)),
    ])
    .unwrap()
}

pub fn ssh_script() -> ScriptedBackend {
    ScriptedBackend::new()
        .with(
            "normalize",
            vec![Reply::json(json!({
                "destination_port": 22,
                "protocol": 6,
                "flow_duration_ms": 353.159,
                "total_forward_packets": 1,
                "total_backward_packets": 1,
                "syn_flag": 0,
                "ack_flag": 1
            }))],
        )
        .with(
            "classify",
            vec![Reply::json(json!({
                "label": "malicious",
                "attack_type": "SSH Brute Force",
                "confidence": 88,
                "reasoning": "Single short exchange to port 22 with ACK set matches the SSH brute force anchor."
            }))],
        )
        .with(
            "decide",
            vec![Reply::json(json!({
                "response": "block",
                "justification": "Malicious verdict with confidence 88 for SSH Brute Force."
            }))],
        )
        .with(
            "enforce",
            vec![Reply::json(json!({
                "action": "block_ip",
                "target": "unknown",
                "mechanism": "firewall",
                "detail": "Add deny rule for the source on tcp/22.",
                "status": "simulated"
            }))],
        )
}

pub fn benign_script() -> ScriptedBackend {
    ScriptedBackend::new()
        .with(
            "normalize",
            vec![Reply::json(json!({
                "destination_port": 80,
                "protocol": 6,
                "flow_duration_ms": 476.608,
                "total_forward_packets": 5,
                "total_backward_packets": 3,
                "flow_bytes_per_second": 1405.77,
                "flow_packets_per_second": 16.79,
                "syn_flag": 0,
                "ack_flag": 0,
                "max_idle_value": 0
            }))],
        )
        .with(
            "classify",
            vec![Reply::json(json!({
                "label": "benign",
                "attack_type": "",
                "confidence": 91,
                "reasoning": "Moderate HTTP rate and packet counts match the benign web anchor."
            }))],
        )
        .with(
            "decide",
            vec![Reply::json(json!({
                "response": "monitor",
                "justification": "Benign verdict; keep passive visibility only."
            }))],
        )
        .with(
            "enforce",
            vec![Reply::json(json!({
                "action": "none",
                "target": "unknown",
                "mechanism": "SOAR",
                "detail": "No enforcement; record in case log.",
                "status": "simulated"
            }))],
        )
}

pub fn retriever() -> Arc<VectorRetriever> {
    Arc::new(VectorRetriever::build(default_corpus(), Arc::new(HashingEmbedder::new(256))).unwrap())
}

pub fn executor_with(backend: Arc<dyn ModelBackend>, retriever: Arc<VectorRetriever>) -> PipelineExecutor {
    let invoker = Arc::new(ModelInvoker::new(backend, Duration::ZERO));
    PipelineExecutor::new(invoker, retriever, 3)
}

pub fn executor(backend: Arc<dyn ModelBackend>) -> PipelineExecutor {
    executor_with(backend, retriever())
}
