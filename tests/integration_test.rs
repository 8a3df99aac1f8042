//! Integration test: config load, row loading and label stripping, no model.

use flow_triage::{
    config::{EmbeddingProvider, PipelineConfig},
    flow::{is_label_key, split_label, FlowError},
    FlowRecord,
};
use serde_json::json;
use std::path::Path;

#[test]
fn config_load_default() {
    let c = PipelineConfig::load(Path::new("nonexistent.json"));
    assert_eq!(c.model.model, "gpt-4o-mini");
    assert_eq!(c.model.timeout_secs, 60);
    assert_eq!(c.retrieval.top_k, 3);
    assert_eq!(c.embedding.provider, EmbeddingProvider::Hashing);
    assert_eq!(c.batch.label_column, "Label");
}

#[test]
fn config_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"model": {"model": "local-llm", "base_url": "http://127.0.0.1:8080/v1"}, "batch": {"workers": 8}}"#,
    )
    .unwrap();

    let c = PipelineConfig::load(&path);
    assert_eq!(c.model.model, "local-llm");
    assert_eq!(c.model.base_url, "http://127.0.0.1:8080/v1");
    assert_eq!(c.model.api_key_env, "OPENAI_API_KEY");
    assert_eq!(c.batch.workers, 8);
    assert_eq!(c.batch.label_column, "Label");
    assert_eq!(c.embedding.dimension, 384);
}

#[test]
fn config_unreadable_file_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();
    assert_eq!(PipelineConfig::load(&path).retrieval.top_k, 3);
}

#[test]
fn split_label_removes_every_label_column() {
    let row = json!({
        "Dst Port": 22,
        "Protocol": 6,
        "Label": "SSH-Bruteforce",
        "attack_cat": "Brute Force",
        "Flow Byts/s": null,
        "Timestamp": "14/02/2018 08:31:01"
    });
    let (features, label) = split_label(row, "Label").unwrap();

    assert_eq!(label.as_deref(), Some("SSH-Bruteforce"));
    let keys: Vec<&str> = features.keys().collect();
    assert_eq!(keys, ["Dst Port", "Protocol", "Timestamp"]);
    assert!(features.label_key().is_none());
}

#[test]
fn split_label_without_label_column() {
    let (features, label) = split_label(json!({"Dst Port": 80}), "Label").unwrap();
    assert!(label.is_none());
    assert_eq!(features.get("Dst Port"), Some(&json!(80)));

    assert_eq!(split_label(json!([1, 2]), "Label").unwrap_err(), FlowError::NotAnObject);
}

#[test]
fn flow_record_rejects_non_scalars() {
    let err = FlowRecord::from_pairs([("flags", json!({"syn": 1}))]).unwrap_err();
    assert_eq!(err, FlowError::NonScalar("flags".to_string()));
    assert!(FlowRecord::from_pairs([("ok", json!(true))]).is_err());

    let parsed: Result<FlowRecord, _> = serde_json::from_value(json!({"a": [1]}));
    assert!(parsed.is_err());
}

#[test]
fn label_key_detection() {
    for key in ["Label", "true_label", "Attack Label", "ground_truth", "Class", "attack_cat"] {
        assert!(is_label_key(key), "{key} should be a label key");
    }
    for key in ["Dst Port", "Flow Duration", "Classification Time", "protocol"] {
        assert!(!is_label_key(key), "{key} should not be a label key");
    }
}
