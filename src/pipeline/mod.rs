//! Pipeline state and the fixed five-stage executor.

mod executor;
mod state;

pub use executor::{CancelToken, PipelineExecutor};
pub use state::{
    AuditEntry, AuditSnapshot, EnforcementAction, EnforcementResult, EnforcementStatus, Mechanism,
    PipelineState, ResponseAction, ResponseDecision, ThreatReport, Verdict,
};
