//! Fixed-order stage execution for one record.

use super::PipelineState;
use crate::error::{PipelineError, StageName};
use crate::flow::FlowRecord;
use crate::model::ModelInvoker;
use crate::retrieval::VectorRetriever;
use crate::stages::{Audit, Classify, Decide, Enforce, Normalize, Stage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, info_span};
use uuid::Uuid;

/// Cooperative cancellation, checked at every stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct PipelineExecutor {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineExecutor {
    /// Normalize → Classify → Decide → Enforce → Audit. The order is fixed here
    /// and nowhere else.
    pub fn new(invoker: Arc<ModelInvoker>, retriever: Arc<VectorRetriever>, top_k: usize) -> Self {
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(Normalize::new(Arc::clone(&invoker))),
            Box::new(Classify::new(Arc::clone(&invoker), retriever, top_k)),
            Box::new(Decide::new(Arc::clone(&invoker))),
            Box::new(Enforce::new(invoker)),
            Box::new(Audit::new()),
        ];
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, features: FlowRecord) -> Result<PipelineState, PipelineError> {
        self.run_with_cancel(features, &CancelToken::new())
    }

    /// Run every stage in order. The first error ends the run; a cancelled run
    /// drops its state, audit entries included.
    pub fn run_with_cancel(
        &self,
        features: FlowRecord,
        cancel: &CancelToken,
    ) -> Result<PipelineState, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _enter = span.enter();

        if let Some(key) = features.label_key() {
            return Err(PipelineError::PreconditionViolation {
                key: key.to_string(),
            });
        }

        let mut state = PipelineState::new(features);
        for stage in &self.stages {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled {
                    stage: stage.name(),
                });
            }
            state = stage.apply(state)?;
        }
        if let Some(report) = state.threat_report() {
            info!(
                label = report.label.as_str(),
                attack_type = %report.attack_type,
                confidence = report.confidence,
                "record classified"
            );
        }
        Ok(state)
    }
}
