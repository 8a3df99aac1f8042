//! flow-triage: staged LLM triage of network-flow records.
//!
//! Modular structure:
//! - [`flow`]: Flow records and ground-truth label stripping
//! - [`contract`]: Per-stage validation of model output
//! - [`model`]: Generative backend seam and the validating invoker
//! - [`retrieval`]: Embedded knowledge corpus and cosine top-k search
//! - [`stages`]: Normalize, Classify, Decide, Enforce, Audit
//! - [`pipeline`]: Pipeline state and the fixed-order executor
//! - [`batch`]: Bounded concurrent driver with per-record outcomes
//! - [`logging`]: Structured JSON logging

pub mod batch;
pub mod config;
pub mod contract;
pub mod error;
pub mod flow;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod retrieval;
pub mod stages;

pub use batch::{BatchRunner, ClassificationRow, FailureRow, LabeledFlow, RecordOutcome};
pub use config::PipelineConfig;
pub use contract::{ContractViolation, StageContract};
pub use error::{PipelineError, StageName};
pub use flow::FlowRecord;
pub use logging::StructuredLogger;
pub use model::{ModelBackend, ModelInvoker};
pub use pipeline::{CancelToken, PipelineExecutor, PipelineState};
pub use retrieval::{Embedder, VectorRetriever};
