//! Pipeline error kinds. Every variant is fatal for the record it was raised on
//! and never for the batch.

use crate::contract::ContractViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stage identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Normalize,
    Classify,
    Decide,
    Enforce,
    Audit,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Normalize => "normalize",
            StageName::Classify => "classify",
            StageName::Decide => "decide",
            StageName::Enforce => "enforce",
            StageName::Audit => "audit",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("precondition violated: input carries label field `{key}`")]
    PreconditionViolation { key: String },

    #[error("{stage}: model call failed after {attempts} attempt(s): {message}")]
    ModelCallFailure {
        stage: StageName,
        attempts: u32,
        message: String,
    },

    #[error("{stage}: response rejected after {attempts} attempt(s): {violation}")]
    ContractValidationFailure {
        stage: StageName,
        attempts: u32,
        violation: ContractViolation,
        /// Last raw model response
        raw: String,
    },

    #[error("{stage}: required input `{field}` is not set")]
    MissingInput {
        stage: StageName,
        field: &'static str,
    },

    #[error("{stage}: state field `{field}` was already set")]
    StateConflict {
        stage: StageName,
        field: &'static str,
    },

    #[error("run cancelled before {stage}")]
    Cancelled { stage: StageName },
}

impl PipelineError {
    /// Stage the failure is attributed to. Precondition failures belong to
    /// Normalize, the stage that never got to run.
    pub fn stage(&self) -> StageName {
        match self {
            PipelineError::PreconditionViolation { .. } => StageName::Normalize,
            PipelineError::ModelCallFailure { stage, .. }
            | PipelineError::ContractValidationFailure { stage, .. }
            | PipelineError::MissingInput { stage, .. }
            | PipelineError::StateConflict { stage, .. }
            | PipelineError::Cancelled { stage } => *stage,
        }
    }

    /// Short machine-readable kind for result rows and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::PreconditionViolation { .. } => "precondition_violation",
            PipelineError::ModelCallFailure { .. } => "model_call_failure",
            PipelineError::ContractValidationFailure { .. } => "contract_validation_failure",
            PipelineError::MissingInput { .. } => "missing_input",
            PipelineError::StateConflict { .. } => "state_conflict",
            PipelineError::Cancelled { .. } => "cancelled",
        }
    }

    /// Last raw model response, when the failure came from contract validation.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PipelineError::ContractValidationFailure { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
