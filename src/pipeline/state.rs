//! The record threaded through the stages. One owning stage per field; every
//! field is written once and read-only afterwards.

use crate::error::{PipelineError, StageName};
use crate::flow::FlowRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Benign,
    Malicious,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Benign => "benign",
            Verdict::Malicious => "malicious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatReport {
    pub label: Verdict,
    pub attack_type: String,
    /// 0–100
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseAction {
    Block,
    Alert,
    Monitor,
    Ignore,
}

impl ResponseAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseAction::Block => "block",
            ResponseAction::Alert => "alert",
            ResponseAction::Monitor => "monitor",
            ResponseAction::Ignore => "ignore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDecision {
    pub response: ResponseAction,
    pub justification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementAction {
    BlockIp,
    Alert,
    IsolateHost,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    #[serde(rename = "firewall")]
    Firewall,
    #[serde(rename = "IAM")]
    Iam,
    #[serde(rename = "SOAR")]
    Soar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementStatus {
    Executed,
    Simulated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementResult {
    pub action: EnforcementAction,
    /// Source address from the normalized event, or `unknown`
    #[serde(default)]
    pub target: String,
    pub mechanism: Mechanism,
    pub detail: String,
    pub status: EnforcementStatus,
}

/// Copies of every stage output at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSnapshot {
    pub raw_features: FlowRecord,
    pub normalized_event: Option<Map<String, Value>>,
    pub threat_report: Option<ThreatReport>,
    pub response_decision: Option<ResponseDecision>,
    pub enforcement_result: Option<EnforcementResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub snapshot: AuditSnapshot,
    /// Hex SHA-256 over `recorded_at` and the serialized snapshot
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    raw_features: FlowRecord,
    normalized_event: Option<Map<String, Value>>,
    threat_report: Option<ThreatReport>,
    response_decision: Option<ResponseDecision>,
    enforcement_result: Option<EnforcementResult>,
    audit_log: Vec<AuditEntry>,
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    stage: StageName,
    field: &'static str,
) -> Result<(), PipelineError> {
    if slot.is_some() {
        return Err(PipelineError::StateConflict { stage, field });
    }
    *slot = Some(value);
    Ok(())
}

impl PipelineState {
    pub fn new(raw_features: FlowRecord) -> Self {
        Self {
            raw_features,
            normalized_event: None,
            threat_report: None,
            response_decision: None,
            enforcement_result: None,
            audit_log: Vec::new(),
        }
    }

    pub fn raw_features(&self) -> &FlowRecord {
        &self.raw_features
    }

    pub fn normalized_event(&self) -> Option<&Map<String, Value>> {
        self.normalized_event.as_ref()
    }

    pub fn threat_report(&self) -> Option<&ThreatReport> {
        self.threat_report.as_ref()
    }

    pub fn response_decision(&self) -> Option<&ResponseDecision> {
        self.response_decision.as_ref()
    }

    pub fn enforcement_result(&self) -> Option<&EnforcementResult> {
        self.enforcement_result.as_ref()
    }

    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit_log
    }

    /// True once Normalize through Enforce have all written their outputs.
    pub fn is_complete(&self) -> bool {
        self.normalized_event.is_some()
            && self.threat_report.is_some()
            && self.response_decision.is_some()
            && self.enforcement_result.is_some()
    }

    pub fn set_normalized_event(&mut self, event: Map<String, Value>) -> Result<(), PipelineError> {
        set_once(&mut self.normalized_event, event, StageName::Normalize, "normalized_event")
    }

    pub fn set_threat_report(&mut self, report: ThreatReport) -> Result<(), PipelineError> {
        set_once(&mut self.threat_report, report, StageName::Classify, "threat_report")
    }

    pub fn set_response_decision(&mut self, decision: ResponseDecision) -> Result<(), PipelineError> {
        set_once(&mut self.response_decision, decision, StageName::Decide, "response_decision")
    }

    pub fn set_enforcement_result(&mut self, result: EnforcementResult) -> Result<(), PipelineError> {
        set_once(&mut self.enforcement_result, result, StageName::Enforce, "enforcement_result")
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        AuditSnapshot {
            raw_features: self.raw_features.clone(),
            normalized_event: self.normalized_event.clone(),
            threat_report: self.threat_report.clone(),
            response_decision: self.response_decision.clone(),
            enforcement_result: self.enforcement_result.clone(),
        }
    }

    /// Append-only; prior entries are never touched.
    pub fn push_audit(&mut self, entry: AuditEntry) {
        self.audit_log.push(entry);
    }
}
