//! Audit: append a timestamped, digested snapshot. No model call.

use super::Stage;
use crate::error::{PipelineError, StageName};
use crate::pipeline::{AuditEntry, PipelineState};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct Audit;

impl Audit {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Audit {
    fn name(&self) -> StageName {
        StageName::Audit
    }

    fn apply(&self, mut state: PipelineState) -> Result<PipelineState, PipelineError> {
        let now = Utc::now();
        // strictly increasing even when the clock has not moved
        let recorded_at = match state.audit_log().last() {
            Some(prev) if now <= prev.recorded_at => prev.recorded_at + Duration::microseconds(1),
            _ => now,
        };
        let snapshot = state.snapshot();

        let mut h = Sha256::new();
        h.update(recorded_at.to_rfc3339().as_bytes());
        h.update(serde_json::to_vec(&snapshot).unwrap_or_default());
        let digest = format!("{:x}", h.finalize());

        let entry = AuditEntry {
            id: Uuid::new_v4(),
            recorded_at,
            snapshot,
            digest,
        };
        debug!(entry_id = %entry.id, entries = state.audit_log().len() + 1, "audit entry appended");
        state.push_audit(entry);
        Ok(state)
    }
}
