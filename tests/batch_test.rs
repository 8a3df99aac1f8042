//! Batch driver: ordering, per-record isolation and cancellation.

mod common;

use common::{executor, ssh_script, stage_of, ScriptedBackend};
use flow_triage::batch::{read_rows, BatchRunner, ClassificationRow, FailureRow, LabeledFlow, RecordOutcome};
use flow_triage::model::{ModelBackend, ModelError, ModelRequest};
use flow_triage::pipeline::{CancelToken, ResponseAction, Verdict};
use flow_triage::{FlowRecord, StageName};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

/// Answers like the SSH script, except Normalize returns prose for any
/// record whose destination port is 9999.
struct PoisonPort {
    inner: ScriptedBackend,
}

impl ModelBackend for PoisonPort {
    fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        if stage_of(&request.task) == "normalize" && request.task.contains("9999") {
            return Ok("I cannot normalize this record.".to_string());
        }
        self.inner.complete(request)
    }
}

fn flow(index: usize, port: u16, label: &str) -> LabeledFlow {
    LabeledFlow {
        index,
        features: FlowRecord::from_pairs([
            ("Protocol", json!(6)),
            ("Dst Port", json!(port)),
            ("Flow Duration", json!(1200)),
        ])
        .unwrap(),
        true_label: Some(label.to_string()),
    }
}

#[test]
fn outcomes_follow_input_order() {
    let backend = Arc::new(ssh_script());
    let runner = BatchRunner::new(Arc::new(executor(backend.clone())), 3);
    let rows: Vec<LabeledFlow> = (0..8).map(|i| flow(i, 22, &format!("row-{i}"))).collect();

    let outcomes = runner.run(rows, &CancelToken::new()).unwrap();

    assert_eq!(outcomes.len(), 8);
    for (i, o) in outcomes.iter().enumerate() {
        assert_eq!(o.index(), i);
        match o {
            RecordOutcome::Classified { true_label, state, .. } => {
                assert_eq!(true_label.as_deref(), Some(format!("row-{i}").as_str()));
                assert!(state.is_complete());
            }
            RecordOutcome::Failed { error, .. } => panic!("record {i} failed: {error}"),
        }
    }
    assert_eq!(backend.total_calls(), 8 * 4);
}

#[test]
fn one_bad_record_does_not_stop_the_batch() {
    let backend = Arc::new(PoisonPort { inner: ssh_script() });
    let runner = BatchRunner::new(Arc::new(executor(backend)), 2);
    let rows = vec![flow(0, 22, "SSH-Bruteforce"), flow(1, 9999, "Benign"), flow(2, 22, "SSH-Bruteforce")];

    let outcomes = runner.run(rows, &CancelToken::new()).unwrap();

    let classified: Vec<bool> = outcomes.iter().map(RecordOutcome::is_classified).collect();
    assert_eq!(classified, vec![true, false, true]);

    let RecordOutcome::Failed { index, true_label, error } = &outcomes[1] else {
        panic!("record 1 should have failed");
    };
    let row = FailureRow::new(*index, true_label.clone(), error);
    assert_eq!(row.index, 1);
    assert_eq!(row.true_label.as_deref(), Some("Benign"));
    assert_eq!(row.stage, StageName::Normalize);
    assert_eq!(row.kind, "contract_validation_failure");
    assert_eq!(row.raw_response.as_deref(), Some("I cannot normalize this record."));
}

#[test]
fn classification_row_carries_report_and_decision() {
    let backend = Arc::new(ssh_script());
    let runner = BatchRunner::new(Arc::new(executor(backend)), 1);
    let outcomes = runner.run(vec![flow(4, 22, "SSH-Bruteforce")], &CancelToken::new()).unwrap();

    let RecordOutcome::Classified { index, true_label, state } = &outcomes[0] else {
        panic!("expected a classified record");
    };
    let row = ClassificationRow::from_state(*index, true_label.clone(), state).unwrap();
    assert_eq!(row.index, 4);
    assert_eq!(row.true_label.as_deref(), Some("SSH-Bruteforce"));
    assert_eq!(row.predicted_label, Verdict::Malicious);
    assert_eq!(row.attack_type, "SSH Brute Force");
    assert_eq!(row.confidence, 88.0);
    assert_eq!(row.response, ResponseAction::Block);
    assert_eq!(row.processed_event["destination_port"], json!(22));

    let line = serde_json::to_value(&row).unwrap();
    assert_eq!(line["predicted_label"], json!("malicious"));
    assert_eq!(line["response"], json!("block"));
}

#[test]
fn cancelled_batch_starts_nothing() {
    let backend = Arc::new(ssh_script());
    let runner = BatchRunner::new(Arc::new(executor(backend.clone())), 2);
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcomes = runner
        .run(vec![flow(0, 22, "a"), flow(1, 22, "b"), flow(2, 22, "c")], &cancel)
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| matches!(
        o,
        RecordOutcome::Failed { error, .. } if error.kind() == "cancelled"
    )));
    assert_eq!(backend.total_calls(), 0);
}

#[test]
fn empty_batch_is_fine() {
    let runner = BatchRunner::new(Arc::new(executor(Arc::new(ssh_script()))), 4);
    assert!(runner.run(Vec::new(), &CancelToken::new()).unwrap().is_empty());
}

#[test]
fn unreadable_lines_are_reported_at_their_input_position() {
    let input = "{\"Dst Port\": 22, \"Label\": \"SSH-Bruteforce\"}\n\
                 [1]\n\
                 \n\
                 {\"Dst Port\": 80, \"Label\": \"Benign\"}\n\
                 {\"flags\": {\"syn\": 1}}\n";
    let (rows, rejected) = read_rows(Cursor::new(input), "Label").unwrap();

    let row_indices: Vec<usize> = rows.iter().map(|r| r.index).collect();
    assert_eq!(row_indices, vec![0, 3]);
    assert_eq!(rows[1].true_label.as_deref(), Some("Benign"));

    let rejected_indices: Vec<usize> = rejected.iter().map(|r| r.index).collect();
    assert_eq!(rejected_indices, vec![1, 4]);
    assert!(rejected.iter().all(|r| r.kind == "unreadable_row"));
}

#[test]
fn outcomes_keep_source_indices_across_gaps() {
    let backend = Arc::new(PoisonPort { inner: ssh_script() });
    let runner = BatchRunner::new(Arc::new(executor(backend)), 2);
    let rows = vec![flow(0, 22, "a"), flow(2, 9999, "b"), flow(5, 22, "c")];

    let outcomes = runner.run(rows, &CancelToken::new()).unwrap();

    let indices: Vec<usize> = outcomes.iter().map(RecordOutcome::index).collect();
    assert_eq!(indices, vec![0, 2, 5]);
    let RecordOutcome::Failed { index, true_label, error } = &outcomes[1] else {
        panic!("record at line 2 should have failed");
    };
    assert_eq!(FailureRow::new(*index, true_label.clone(), error).index, 2);
}
