//! Pipeline benchmark: one record through all five stages against a canned
//! backend, so only prompt building, validation and state handling are measured.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flow_triage::model::{ModelBackend, ModelError, ModelInvoker, ModelRequest};
use flow_triage::pipeline::PipelineExecutor;
use flow_triage::retrieval::{default_corpus, HashingEmbedder, VectorRetriever};
use flow_triage::FlowRecord;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct CannedBackend;

impl ModelBackend for CannedBackend {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let reply = if request.task.starts_with("Raw network flow record") {
            json!({"destination_port": 22, "protocol": 6, "flow_duration_ms": 353.159})
        } else if request.task.starts_with("Threat intelligence report") {
            json!({"response": "block", "justification": "Malicious with confidence 88."})
        } else if request.task.starts_with("Incident details") {
            json!({"action": "block_ip", "target": "unknown", "mechanism": "firewall",
                   "detail": "deny inbound tcp/22", "status": "simulated"})
        } else {
            json!({"label": "malicious", "attack_type": "SSH Brute Force", "confidence": 88,
                   "reasoning": "Short exchange on port 22."})
        };
        Ok(reply.to_string())
    }
}

fn bench_single_record(c: &mut Criterion) {
    let retriever = Arc::new(
        VectorRetriever::build(default_corpus(), Arc::new(HashingEmbedder::new(384)))
            .expect("hashing embedder never fails"),
    );
    let invoker = Arc::new(ModelInvoker::new(Arc::new(CannedBackend), Duration::ZERO));
    let executor = PipelineExecutor::new(invoker, retriever, 3);
    let record = FlowRecord::from_pairs([
        ("Protocol", json!(6)),
        ("Dst Port", json!(22)),
        ("Flow Duration", json!(353159)),
    ])
    .expect("scalar features");

    c.bench_function("pipeline_five_stages_canned", |b| {
        b.iter(|| black_box(executor.run(black_box(record.clone()))))
    });
}

criterion_group!(benches, bench_single_record);
criterion_main!(benches);
