//! Validating invoker: one retry on any failure, then the record is lost.

use super::{ModelBackend, ModelError, ModelRequest};
use crate::contract::{ContractViolation, StageContract};
use crate::error::PipelineError;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempts per stage call: the first try plus exactly one retry.
pub const MAX_ATTEMPTS: u32 = 2;

enum AttemptFailure {
    Call(ModelError),
    Contract(ContractViolation, String),
}

pub struct ModelInvoker {
    backend: Arc<dyn ModelBackend>,
    retry_backoff: Duration,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn ModelBackend>, retry_backoff: Duration) -> Self {
        Self {
            backend,
            retry_backoff,
        }
    }

    /// Send `instruction`/`task` at temperature 0 and decode the object accepted
    /// by `contract` into `T`.
    pub fn invoke<T: DeserializeOwned>(
        &self,
        contract: &StageContract,
        instruction: &str,
        task: &str,
    ) -> Result<T, PipelineError> {
        self.invoke_scoped(contract, instruction, task, &[])
    }

    /// [`invoke`](Self::invoke) where the contract's scoped text fields must not
    /// mention any of `out_of_scope`. A mention counts as a failed attempt.
    pub fn invoke_scoped<T: DeserializeOwned>(
        &self,
        contract: &StageContract,
        instruction: &str,
        task: &str,
        out_of_scope: &[String],
    ) -> Result<T, PipelineError> {
        let stage = contract.stage;
        let request = ModelRequest {
            instruction: instruction.to_string(),
            task: task.to_string(),
            temperature: 0.0,
        };

        let mut last = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                std::thread::sleep(self.jittered_backoff());
            }
            let failure = match self.backend.complete(&request) {
                Ok(raw) => match decode::<T>(contract, &raw, out_of_scope) {
                    Ok(accepted) => {
                        debug!(%stage, attempt, "response accepted");
                        return Ok(accepted);
                    }
                    Err(v) => AttemptFailure::Contract(v, raw),
                },
                Err(e) => AttemptFailure::Call(e),
            };
            match &failure {
                AttemptFailure::Call(e) => warn!(%stage, attempt, error = %e, "model call failed"),
                AttemptFailure::Contract(v, _) => {
                    warn!(%stage, attempt, violation = %v, "response rejected")
                }
            }
            last = Some(failure);
        }

        Err(match last {
            Some(AttemptFailure::Contract(violation, raw)) => PipelineError::ContractValidationFailure {
                stage,
                attempts: MAX_ATTEMPTS,
                violation,
                raw,
            },
            Some(AttemptFailure::Call(e)) => PipelineError::ModelCallFailure {
                stage,
                attempts: MAX_ATTEMPTS,
                message: e.to_string(),
            },
            None => PipelineError::ModelCallFailure {
                stage,
                attempts: 0,
                message: "no attempt made".to_string(),
            },
        })
    }

    fn jittered_backoff(&self) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        if base == 0 {
            return Duration::ZERO;
        }
        let spread = base / 4;
        let ms = rand::thread_rng().gen_range(base - spread..=base + spread);
        Duration::from_millis(ms)
    }
}

fn decode<T: DeserializeOwned>(
    contract: &StageContract,
    raw: &str,
    out_of_scope: &[String],
) -> Result<T, ContractViolation> {
    let accepted = contract.validate_scoped(raw, out_of_scope)?;
    serde_json::from_value(Value::Object(accepted)).map_err(|e| ContractViolation::Shape(e.to_string()))
}
