//! Core domain entities: `Intent`, `Event`, and the records the Store persists.
//!
//! Everything here is immutable once emitted except [`Intent`], whose mutable
//! fields (`status`, `retries`) are updated in place — the audit trail of
//! those changes lives in the event log, not in the struct.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event_type::EventType;

/// Returns the current instant as an RFC-3339 UTC timestamp.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Lifecycle status of an [`Intent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ready,
    Validated,
    Queued,
    Merged,
    Rejected,
    Blocked,
}

impl Status {
    /// Terminal statuses never transition further under normal operation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Merged | Status::Rejected)
    }

    /// Statuses counted as "active" (pending work) by the projections layer.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Ready | Status::Validated | Status::Queued)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Ready => "ready",
            Status::Validated => "validated",
            Status::Queued => "queued",
            Status::Merged => "merged",
            Status::Rejected => "rejected",
            Status::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

/// Risk classification band, ordered low to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Opaque, engine-meaningful payload groups carried on an [`Intent`].
///
/// These stay as JSON blobs at the store boundary — only the engine
/// interprets their shape, so typing them as Rust structs here would just
/// duplicate the schema the semantic layer already owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentSemantic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentTechnical {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_hints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

/// A proposed change moving through the merge-coordination lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,

    pub source: String,
    pub target: String,

    pub status: Status,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    pub risk_level: RiskLevel,
    pub priority: u8,
    pub origin_type: String,

    #[serde(default)]
    pub semantic: IntentSemantic,
    #[serde(default)]
    pub technical: IntentTechnical,
    #[serde(default)]
    pub checks_required: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Intent {
    /// A freshly ingested intent: `READY`, zero retries, default risk level.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Intent {
            id: id.into(),
            tenant_id: None,
            plan_id: None,
            source: source.into(),
            target: target.into(),
            status: Status::Ready,
            retries: 0,
            created_at: now(),
            created_by: None,
            risk_level: RiskLevel::Low,
            priority: 3,
            origin_type: "human".to_string(),
            semantic: IntentSemantic::default(),
            technical: IntentTechnical::default(),
            checks_required: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

/// An immutable fact recorded in the append-only event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Value>,
}

impl Event {
    /// Constructs an event stamped with the current time; `id` is assigned
    /// by the store on append.
    pub fn new(event_type: EventType, trace_id: impl Into<String>, payload: Value) -> Self {
        Event {
            id: None,
            event_type,
            timestamp: now(),
            trace_id: trace_id.into(),
            intent_id: None,
            agent_id: None,
            tenant_id: None,
            payload,
            evidence: None,
        }
    }

    pub fn with_intent(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Value) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// The result of a dry-run merge simulation, before any branch is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub mergeable: bool,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub files_changed: Vec<String>,
    pub source: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

/// A link between an intent and an SCM commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitRole {
    Head,
    Base,
    Merge,
}

/// `(intent_id, repo, sha, role)` — composite primary key, upsert semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitLink {
    pub intent_id: String,
    pub repo: String,
    pub sha: String,
    pub role: CommitRole,
}

/// Autonomy trust level, numeric limits, and allow-lists for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPolicy {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub atl: u8,
    pub max_risk_score: f64,
    pub max_blast_severity: f64,
    pub min_test_coverage: f64,
    pub require_compliance_pass: bool,
    pub require_human_approval: bool,
    pub require_dual_approval_on_critical: bool,
    #[serde(default)]
    pub allow_actions: Vec<String>,
    #[serde(default)]
    pub action_overrides: BTreeMap<String, ActionOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A partial limit override scoped to one action name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_blast_severity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_human_approval: Option<bool>,
}

/// Per-tenant thresholds for the risk gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPolicy {
    pub tenant_id: String,
    pub low_threshold: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub critical_threshold: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        RiskPolicy {
            tenant_id: String::new(),
            low_threshold: 0.0,
            medium_threshold: 25.0,
            high_threshold: 50.0,
            critical_threshold: 75.0,
        }
    }
}

/// Per-tenant SLO targets consumed by the compliance projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceThresholds {
    pub tenant_id: String,
    pub min_mergeable_rate: f64,
    pub max_conflict_rate: f64,
    pub max_retries_total: u32,
    pub max_queue_tracked: u32,
    pub max_debt_score: f64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        ComplianceThresholds {
            tenant_id: String::new(),
            min_mergeable_rate: 0.80,
            max_conflict_rate: 0.20,
            max_retries_total: 200,
            max_queue_tracked: 1000,
            max_debt_score: 70.0,
        }
    }
}

/// Status of a [`ReviewTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Assigned,
    Completed,
    Cancelled,
    Escalated,
}

/// A human-review assignment with an SLA deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewTask {
    pub id: String,
    pub intent_id: String,
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    pub priority: u8,
    pub sla_deadline: DateTime<Utc>,
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A deterministic embedding for one `(intent_id, model)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub intent_id: String,
    pub model: String,
    pub dimension: usize,
    pub checksum: String,
    pub vector: Vec<f32>,
    pub generated_at: DateTime<Utc>,
}

/// One row of the advisory lock table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueLock {
    pub lock_name: String,
    pub holder_pid: i64,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A recorded webhook delivery id, for idempotency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub delivery_id: String,
    pub received_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The hash-chain tip for one chain (typically the single chain `"main"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub chain_id: String,
    pub last_hash: String,
    pub event_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Severity band for a normalized security finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

/// Scanner family a finding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Sast,
    Sca,
    Secrets,
}

/// A normalized security-scanner finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub id: String,
    pub scanner: String,
    pub category: FindingCategory,
    pub severity: FindingSeverity,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub rule: String,
    #[serde(default)]
    pub evidence: String,
    #[serde(default = "default_confidence")]
    pub confidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

fn default_confidence() -> String {
    "medium".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_active_and_terminal_partition_the_set() {
        let all = [
            Status::Ready,
            Status::Validated,
            Status::Queued,
            Status::Merged,
            Status::Rejected,
            Status::Blocked,
        ];
        for s in all {
            assert_ne!(s.is_active(), s.is_terminal() && s.is_active());
        }
        assert!(Status::Ready.is_active());
        assert!(!Status::Ready.is_terminal());
        assert!(Status::Merged.is_terminal());
        assert!(!Status::Merged.is_active());
        assert!(!Status::Blocked.is_active());
        assert!(!Status::Blocked.is_terminal());
    }

    #[test]
    fn new_intent_defaults_to_ready_with_zero_retries() {
        let i = Intent::new("i-1", "feature/x", "main");
        assert_eq!(i.status, Status::Ready);
        assert_eq!(i.retries, 0);
        assert!(i.dependencies.is_empty());
    }

    #[test]
    fn risk_policy_defaults_match_classification_bands() {
        let p = RiskPolicy::default();
        assert_eq!(p.low_threshold, 0.0);
        assert_eq!(p.medium_threshold, 25.0);
        assert_eq!(p.high_threshold, 50.0);
        assert_eq!(p.critical_threshold, 75.0);
    }

    #[test]
    fn event_serializes_event_type_as_dotted_string() {
        let e = Event::new(EventType::IntentCreated, "trace-1", serde_json::json!({}));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["event_type"], "intent.created");
    }
}
