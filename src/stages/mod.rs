//! The five pipeline stages. Each takes the state by value and hands it back
//! with exactly its own field filled in.

mod audit;
mod classify;
mod decide;
mod enforce;
mod normalize;

pub use audit::Audit;
pub use classify::Classify;
pub use decide::Decide;
pub use enforce::{extract_target, Enforce};
pub use normalize::Normalize;

use crate::error::{PipelineError, StageName};
use crate::pipeline::PipelineState;

pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;
    fn apply(&self, state: PipelineState) -> Result<PipelineState, PipelineError>;
}

fn require<T>(value: Option<T>, stage: StageName, field: &'static str) -> Result<T, PipelineError> {
    value.ok_or(PipelineError::MissingInput { stage, field })
}
