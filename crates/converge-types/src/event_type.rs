//! The event type registry: a stable, dotted-string wire contract.
//!
//! Every persisted [`crate::Event`] carries one of these. The string form is
//! what actually hits the store and the wire; the enum exists so the rest of
//! the codebase gets exhaustiveness checking instead of stringly-typed
//! comparisons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A known event type, one per family (`intent.*`, `simulation.*`, `risk.*`,
/// `policy.*`, `queue.*`, `health.*`, `compliance.*`, `agent.*`, `review.*`,
/// `webhook.*`, `audit.chain.*`, `security.*`, `intake.*`, `feature_flag.*`),
/// plus the later-added semantic-layer family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    IntentCreated,
    IntentUpdated,
    IntentMerged,
    IntentRejected,
    IntentRequeued,
    IntentDependencyBlocked,
    RiskLevelReclassified,

    SimulationCompleted,

    CheckCompleted,

    RiskEvaluated,
    RiskShadowEvaluated,

    PolicyEvaluated,

    QueueReset,

    HealthSnapshot,
    HealthChangeSnapshot,

    ComplianceThresholdsUpdated,
    VerificationDebtSnapshot,

    AgentPolicyUpdated,
    AgentAuthorized,
    SodViolation,

    ReviewRequested,
    ReviewAssigned,
    ReviewCompleted,
    ReviewCancelled,
    ReviewEscalated,
    ReviewSlaBreached,

    WebhookDeliveryReceived,
    NotificationSent,
    NotificationFailed,

    ChainInitialized,
    ChainVerified,
    ChainTamperDetected,

    SecurityScanStarted,
    SecurityScanCompleted,
    SecurityFindingDetected,

    IntakeThrottled,
    IntakePaused,
    IntakeAccepted,

    FeatureFlagChanged,

    SemanticConflictDetected,
    SemanticConflictResolved,

    /// An extension event type not in the known registry. Carries its raw
    /// dotted string so round-tripping never loses data.
    Unknown(String),
}

impl EventType {
    /// The canonical dotted-string form, as it appears on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::IntentCreated => "intent.created",
            EventType::IntentUpdated => "intent.updated",
            EventType::IntentMerged => "intent.merged",
            EventType::IntentRejected => "intent.rejected",
            EventType::IntentRequeued => "intent.requeued",
            EventType::IntentDependencyBlocked => "intent.dependency_blocked",
            EventType::RiskLevelReclassified => "risk.level_reclassified",
            EventType::SimulationCompleted => "simulation.completed",
            EventType::CheckCompleted => "check.completed",
            EventType::RiskEvaluated => "risk.evaluated",
            EventType::RiskShadowEvaluated => "risk.shadow_evaluated",
            EventType::PolicyEvaluated => "policy.evaluated",
            EventType::QueueReset => "queue.reset",
            EventType::HealthSnapshot => "health.snapshot",
            EventType::HealthChangeSnapshot => "health.change_snapshot",
            EventType::ComplianceThresholdsUpdated => "compliance.thresholds_updated",
            EventType::VerificationDebtSnapshot => "compliance.verification_debt_snapshot",
            EventType::AgentPolicyUpdated => "agent.policy_updated",
            EventType::AgentAuthorized => "agent.authorized",
            EventType::SodViolation => "agent.sod_violation",
            EventType::ReviewRequested => "review.requested",
            EventType::ReviewAssigned => "review.assigned",
            EventType::ReviewCompleted => "review.completed",
            EventType::ReviewCancelled => "review.cancelled",
            EventType::ReviewEscalated => "review.escalated",
            EventType::ReviewSlaBreached => "review.sla_breached",
            EventType::WebhookDeliveryReceived => "webhook.delivery_received",
            EventType::NotificationSent => "webhook.notification_sent",
            EventType::NotificationFailed => "webhook.notification_failed",
            EventType::ChainInitialized => "audit.chain.initialized",
            EventType::ChainVerified => "audit.chain.verified",
            EventType::ChainTamperDetected => "audit.chain.tamper_detected",
            EventType::SecurityScanStarted => "security.scan_started",
            EventType::SecurityScanCompleted => "security.scan_completed",
            EventType::SecurityFindingDetected => "security.finding_detected",
            EventType::IntakeThrottled => "intake.throttled",
            EventType::IntakePaused => "intake.paused",
            EventType::IntakeAccepted => "intake.accepted",
            EventType::FeatureFlagChanged => "feature_flag.changed",
            EventType::SemanticConflictDetected => "semantic.conflict_detected",
            EventType::SemanticConflictResolved => "semantic.conflict_resolved",
            EventType::Unknown(s) => s,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "intent.created" => EventType::IntentCreated,
            "intent.updated" => EventType::IntentUpdated,
            "intent.merged" => EventType::IntentMerged,
            "intent.rejected" => EventType::IntentRejected,
            "intent.requeued" => EventType::IntentRequeued,
            "intent.dependency_blocked" => EventType::IntentDependencyBlocked,
            "risk.level_reclassified" => EventType::RiskLevelReclassified,
            "simulation.completed" => EventType::SimulationCompleted,
            "check.completed" => EventType::CheckCompleted,
            "risk.evaluated" => EventType::RiskEvaluated,
            "risk.shadow_evaluated" => EventType::RiskShadowEvaluated,
            "policy.evaluated" => EventType::PolicyEvaluated,
            "queue.reset" => EventType::QueueReset,
            "health.snapshot" => EventType::HealthSnapshot,
            "health.change_snapshot" => EventType::HealthChangeSnapshot,
            "compliance.thresholds_updated" => EventType::ComplianceThresholdsUpdated,
            "compliance.verification_debt_snapshot" => EventType::VerificationDebtSnapshot,
            "agent.policy_updated" => EventType::AgentPolicyUpdated,
            "agent.authorized" => EventType::AgentAuthorized,
            "agent.sod_violation" => EventType::SodViolation,
            "review.requested" => EventType::ReviewRequested,
            "review.assigned" => EventType::ReviewAssigned,
            "review.completed" => EventType::ReviewCompleted,
            "review.cancelled" => EventType::ReviewCancelled,
            "review.escalated" => EventType::ReviewEscalated,
            "review.sla_breached" => EventType::ReviewSlaBreached,
            "webhook.delivery_received" => EventType::WebhookDeliveryReceived,
            "webhook.notification_sent" => EventType::NotificationSent,
            "webhook.notification_failed" => EventType::NotificationFailed,
            "audit.chain.initialized" => EventType::ChainInitialized,
            "audit.chain.verified" => EventType::ChainVerified,
            "audit.chain.tamper_detected" => EventType::ChainTamperDetected,
            "security.scan_started" => EventType::SecurityScanStarted,
            "security.scan_completed" => EventType::SecurityScanCompleted,
            "security.finding_detected" => EventType::SecurityFindingDetected,
            "intake.throttled" => EventType::IntakeThrottled,
            "intake.paused" => EventType::IntakePaused,
            "intake.accepted" => EventType::IntakeAccepted,
            "feature_flag.changed" => EventType::FeatureFlagChanged,
            "semantic.conflict_detected" => EventType::SemanticConflictDetected,
            "semantic.conflict_resolved" => EventType::SemanticConflictResolved,
            other => EventType::Unknown(other.to_string()),
        })
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EventType::from_str(&s).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        let types = [
            EventType::IntentCreated,
            EventType::ChainTamperDetected,
            EventType::SemanticConflictResolved,
        ];
        for t in types {
            assert_eq!(EventType::from_str(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_event_type_preserves_string() {
        let t = EventType::from_str("custom.widget_rotated").unwrap();
        assert_eq!(t.as_str(), "custom.widget_rotated");
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&EventType::IntentMerged).unwrap();
        assert_eq!(json, "\"intent.merged\"");
    }
}
