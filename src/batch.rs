//! Batch driver: independent records through a bounded worker pool, with
//! per-record outcomes returned in input order.

use crate::error::{PipelineError, StageName};
use crate::flow::{split_label, FlowRecord};
use crate::pipeline::{CancelToken, PipelineExecutor, PipelineState, ResponseAction, Verdict};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A label-free record plus the label kept aside for evaluation.
#[derive(Debug, Clone)]
pub struct LabeledFlow {
    /// Zero-based input line the row was read from
    pub index: usize,
    pub features: FlowRecord,
    pub true_label: Option<String>,
}

/// An input line that never became a record.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    pub index: usize,
    pub kind: &'static str,
    pub error: String,
}

impl RejectedRow {
    fn new(index: usize, error: impl ToString) -> Self {
        Self {
            index,
            kind: "unreadable_row",
            error: error.to_string(),
        }
    }
}

/// Read JSON-lines rows and strip `label_column` from each. Blank lines are
/// skipped; every other line yields either a record or a rejection, both
/// tagged with the line's zero-based index.
pub fn read_rows(
    reader: impl BufRead,
    label_column: &str,
) -> std::io::Result<(Vec<LabeledFlow>, Vec<RejectedRow>)> {
    let mut rows = Vec::new();
    let mut rejected = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<Value>(&line)
            .map_err(|e| e.to_string())
            .and_then(|v| split_label(v, label_column).map_err(|e| e.to_string()));
        match parsed {
            Ok((features, true_label)) => rows.push(LabeledFlow {
                index,
                features,
                true_label,
            }),
            Err(e) => {
                warn!(index, error = %e, "unreadable row");
                rejected.push(RejectedRow::new(index, e));
            }
        }
    }
    Ok((rows, rejected))
}

#[derive(Debug)]
pub enum RecordOutcome {
    Classified {
        index: usize,
        true_label: Option<String>,
        state: Box<PipelineState>,
    },
    Failed {
        index: usize,
        true_label: Option<String>,
        error: PipelineError,
    },
}

impl RecordOutcome {
    fn from_result(index: usize, true_label: Option<String>, result: Result<PipelineState, PipelineError>) -> Self {
        match result {
            Ok(state) => RecordOutcome::Classified {
                index,
                true_label,
                state: Box::new(state),
            },
            Err(error) => RecordOutcome::Failed {
                index,
                true_label,
                error,
            },
        }
    }

    pub fn index(&self) -> usize {
        match self {
            RecordOutcome::Classified { index, .. } | RecordOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, RecordOutcome::Classified { .. })
    }
}

/// Per-record row handed to the result sink.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRow {
    pub index: usize,
    pub true_label: Option<String>,
    pub predicted_label: Verdict,
    pub attack_type: String,
    pub processed_event: Map<String, Value>,
    pub reasoning: String,
    pub confidence: f64,
    pub response: ResponseAction,
}

impl ClassificationRow {
    /// None when the state has not been through Classify and Decide.
    pub fn from_state(index: usize, true_label: Option<String>, state: &PipelineState) -> Option<Self> {
        let report = state.threat_report()?;
        let decision = state.response_decision()?;
        Some(Self {
            index,
            true_label,
            predicted_label: report.label,
            attack_type: report.attack_type.clone(),
            processed_event: state.normalized_event()?.clone(),
            reasoning: report.reasoning.clone(),
            confidence: report.confidence,
            response: decision.response,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRow {
    pub index: usize,
    pub true_label: Option<String>,
    pub stage: StageName,
    pub kind: &'static str,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl FailureRow {
    pub fn new(index: usize, true_label: Option<String>, error: &PipelineError) -> Self {
        Self {
            index,
            true_label,
            stage: error.stage(),
            kind: error.kind(),
            error: error.to_string(),
            raw_response: error.raw_response().map(str::to_string),
        }
    }
}

enum Pending {
    Done(RecordOutcome),
    Running(JoinHandle<RecordOutcome>),
}

pub struct BatchRunner {
    executor: Arc<PipelineExecutor>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(executor: Arc<PipelineExecutor>, workers: usize) -> Self {
        Self {
            executor,
            workers: workers.max(1),
        }
    }

    /// Run every row; at most `workers` records are in flight. Outcomes keep
    /// the order of `rows` and carry each row's own index. Once `cancel` fires
    /// no new record starts, and in-flight records stop at their next stage
    /// boundary.
    pub fn run(&self, rows: Vec<LabeledFlow>, cancel: &CancelToken) -> std::io::Result<Vec<RecordOutcome>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("flow-triage-batch")
            .build()?;
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let total = rows.len();

        let outcomes = runtime.block_on(async {
            let mut pending = Vec::with_capacity(total);
            for row in rows {
                let index = row.index;
                let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
                if cancel.is_cancelled() {
                    pending.push(Pending::Done(RecordOutcome::Failed {
                        index,
                        true_label: row.true_label,
                        error: PipelineError::Cancelled {
                            stage: StageName::Normalize,
                        },
                    }));
                    continue;
                }
                let executor = Arc::clone(&self.executor);
                let cancel = cancel.clone();
                pending.push(Pending::Running(tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let result = executor.run_with_cancel(row.features, &cancel);
                    RecordOutcome::from_result(index, row.true_label, result)
                })));
            }

            let mut out = Vec::with_capacity(total);
            for p in pending {
                let outcome = match p {
                    Pending::Done(o) => o,
                    Pending::Running(handle) => match handle.await {
                        Ok(o) => o,
                        Err(e) => std::panic::resume_unwind(e.into_panic()),
                    },
                };
                if let RecordOutcome::Failed { index, error, .. } = &outcome {
                    warn!(index, stage = %error.stage(), kind = error.kind(), error = %error, "record failed");
                }
                out.push(outcome);
            }
            out
        });

        let classified = outcomes.iter().filter(|o| o.is_classified()).count();
        info!(total, classified, failed = total - classified, "batch complete");
        Ok(outcomes)
    }
}
