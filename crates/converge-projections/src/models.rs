//! Projection output shapes, ported from `projections_models.py`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoHealth {
    pub repo_health_score: f64,
    pub entropy_score: f64,
    pub mergeable_rate: f64,
    pub conflict_rate: f64,
    pub active_intents: u64,
    pub merged_last_24h: u64,
    pub rejected_last_24h: u64,
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeHealth {
    pub intent_id: String,
    pub risk_score: f64,
    pub damage_score: f64,
    pub mergeable: bool,
    pub policy_verdict: Option<String>,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceCheck {
    pub name: String,
    pub value: f64,
    pub threshold: f64,
    pub op: String,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub mergeable_rate: f64,
    pub conflict_rate: f64,
    pub retries_total: u64,
    pub queue_tracked: u64,
    pub checks: Vec<ComplianceCheck>,
    pub passed: bool,
    pub alerts: Vec<ComplianceCheck>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtBreakdown {
    pub stale_intents: u64,
    pub active_intents: u64,
    pub stale_hours_threshold: u32,
    pub queue_capacity: u32,
    pub pending_reviews: u64,
    pub review_capacity: u32,
    pub conflict_rate: f64,
    pub retry_intents: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationDebt {
    pub debt_score: f64,
    pub staleness_score: f64,
    pub queue_pressure_score: f64,
    pub review_backlog_score: f64,
    pub conflict_pressure_score: f64,
    pub retry_pressure_score: f64,
    pub breakdown: DebtBreakdown,
    pub status: HealthStatus,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub pending: Vec<PendingIntent>,
    pub total: u64,
    pub by_status: std::collections::BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingIntent {
    pub intent_id: String,
    pub status: String,
    pub priority: u8,
    pub retries: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub total_events: u64,
    pub merged: u64,
    pub rejected: u64,
    pub blocked: u64,
    pub success_rate: f64,
    pub trust_score: f64,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionSignal {
    pub signal: String,
    pub severity: String,
    pub message: String,
    pub recommendation: String,
}

pub fn status_for_health_score(score: f64) -> HealthStatus {
    if score >= 70.0 {
        HealthStatus::Green
    } else if score >= 40.0 {
        HealthStatus::Yellow
    } else {
        HealthStatus::Red
    }
}

pub fn status_for_debt_score(score: f64) -> HealthStatus {
    if score <= 30.0 {
        HealthStatus::Green
    } else if score <= 70.0 {
        HealthStatus::Yellow
    } else {
        HealthStatus::Red
    }
}
