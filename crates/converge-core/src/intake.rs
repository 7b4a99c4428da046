//! Intake controller: accept, throttle, or pause new intent intake based on
//! repo health and verification debt.
//!
//! The decision rule works off `RepoHealth.status`/debt-status (red/yellow/
//! green) rather than raw numeric health-score cutoffs — see DESIGN.md for
//! why.

use std::sync::Arc;

use converge_events::EventLog;
use converge_policy::rollout_bucket;
use converge_projections::{HealthStatus, RepoHealth, VerificationDebt};
use converge_store::ConvergeStore;
use converge_types::{ConvergeError, Event, EventType};

/// Fraction of intake accepted while throttled.
pub const THROTTLE_ACCEPT_RATIO: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum IntakeDecision {
    Accept,
    Throttle { reason: String },
    Pause { reason: String },
}

pub struct IntakeController {
    events: EventLog,
}

impl IntakeController {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        IntakeController { events: EventLog::new(store) }
    }

    /// Pure decision rule: pause on red, throttle on yellow (hash-bucketed
    /// the same way rollout percentages are), else accept.
    pub fn decide(&self, health: &RepoHealth, debt: &VerificationDebt, bucket_key: &str) -> IntakeDecision {
        if health.status == HealthStatus::Red || debt.status == HealthStatus::Red {
            return IntakeDecision::Pause { reason: "repo health or verification debt is red".to_string() };
        }
        if health.status == HealthStatus::Yellow || debt.status == HealthStatus::Yellow {
            if rollout_bucket(bucket_key) < THROTTLE_ACCEPT_RATIO {
                return IntakeDecision::Accept;
            }
            return IntakeDecision::Throttle { reason: "repo health or verification debt is yellow".to_string() };
        }
        IntakeDecision::Accept
    }

    /// Evaluates intake for `tenant_id` and records a transition event only
    /// when the decision changes the prior state: `INTAKE_ACCEPTED` fires
    /// only on recovery from throttle/pause, never on steady-state accept.
    pub fn intake_decision(
        &self,
        tenant_id: &str,
        health: &RepoHealth,
        debt: &VerificationDebt,
        previously_restricted: bool,
    ) -> Result<IntakeDecision, ConvergeError> {
        let decision = self.decide(health, debt, tenant_id);

        match &decision {
            IntakeDecision::Pause { reason } => {
                self.events.append(
                    Event::new(EventType::IntakePaused, String::new(), serde_json::json!({"reason": reason}))
                        .with_tenant(tenant_id),
                )?;
            }
            IntakeDecision::Throttle { reason } => {
                self.events.append(
                    Event::new(EventType::IntakeThrottled, String::new(), serde_json::json!({"reason": reason}))
                        .with_tenant(tenant_id),
                )?;
            }
            IntakeDecision::Accept if previously_restricted => {
                self.events.append(
                    Event::new(EventType::IntakeAccepted, String::new(), serde_json::json!({}))
                        .with_tenant(tenant_id),
                )?;
            }
            IntakeDecision::Accept => {}
        }

        Ok(decision)
    }

    /// Current throttle/pause status for a tenant, from the most recent
    /// intake event — used by `intake_status` callers without recomputing
    /// health/debt.
    pub fn intake_status(&self, tenant_id: &str) -> Result<Option<IntakeDecision>, ConvergeError> {
        let filter = converge_store::EventFilter::new().with_tenant_id(tenant_id).with_limit(200);
        let events = self.events.query(&filter)?;
        for event in events {
            match event.event_type {
                EventType::IntakePaused => {
                    let reason = event.payload["reason"].as_str().unwrap_or_default().to_string();
                    return Ok(Some(IntakeDecision::Pause { reason }));
                }
                EventType::IntakeThrottled => {
                    let reason = event.payload["reason"].as_str().unwrap_or_default().to_string();
                    return Ok(Some(IntakeDecision::Throttle { reason }));
                }
                EventType::IntakeAccepted => return Ok(Some(IntakeDecision::Accept)),
                _ => continue,
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_store::SqliteStore;
    use chrono::Utc;

    fn controller() -> IntakeController {
        IntakeController::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    fn health(status: HealthStatus) -> RepoHealth {
        RepoHealth {
            repo_health_score: 0.0,
            entropy_score: 0.0,
            mergeable_rate: 0.0,
            conflict_rate: 0.0,
            active_intents: 0,
            merged_last_24h: 0,
            rejected_last_24h: 0,
            status,
            timestamp: Utc::now(),
            tenant_id: None,
        }
    }

    fn debt(status: HealthStatus) -> VerificationDebt {
        VerificationDebt {
            debt_score: 0.0,
            staleness_score: 0.0,
            queue_pressure_score: 0.0,
            review_backlog_score: 0.0,
            conflict_pressure_score: 0.0,
            retry_pressure_score: 0.0,
            breakdown: converge_projections::DebtBreakdown {
                stale_intents: 0,
                active_intents: 0,
                stale_hours_threshold: 24,
                queue_capacity: 50,
                pending_reviews: 0,
                review_capacity: 10,
                conflict_rate: 0.0,
                retry_intents: 0,
            },
            status,
            tenant_id: None,
        }
    }

    #[test]
    fn red_health_pauses_regardless_of_debt() {
        let c = controller();
        let decision = c.decide(&health(HealthStatus::Red), &debt(HealthStatus::Green), "tenant-a");
        assert!(matches!(decision, IntakeDecision::Pause { .. }));
    }

    #[test]
    fn green_both_accepts() {
        let c = controller();
        let decision = c.decide(&health(HealthStatus::Green), &debt(HealthStatus::Green), "tenant-a");
        assert_eq!(decision, IntakeDecision::Accept);
    }

    #[test]
    fn accept_only_emits_on_recovery() {
        let c = controller();
        let h = health(HealthStatus::Green);
        let d = debt(HealthStatus::Green);
        c.intake_decision("tenant-a", &h, &d, false).unwrap();
        let events = c.events.query(&converge_store::EventFilter::new().with_tenant_id("tenant-a")).unwrap();
        assert!(events.is_empty());

        c.intake_decision("tenant-a", &h, &d, true).unwrap();
        let events = c.events.query(&converge_store::EventFilter::new().with_tenant_id("tenant-a")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IntakeAccepted);
    }
}
