//! Human review workflow (§4.9): request/assign/complete/cancel/escalate a
//! [`ReviewTask`], plus SLA-breach scanning.
//!
//! `reviews.py` did not survive the retrieval pack's filtering — the function
//! names below (`request_review`/`assign_review`/`complete_review`/
//! `cancel_review`/`escalate_review`/`check_sla_breaches`) are recovered from
//! `original_source/api/routers/reviews.py`'s `from converge import reviews`
//! call sites and `tests/test_reviews.py`'s import list.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use converge_events::EventLog;
use converge_store::ConvergeStore;
use converge_types::{ConvergeError, Event, EventType, ReviewStatus, ReviewTask, RiskLevel};

/// `REVIEW_SLA_HOURS`: default turnaround budget per risk band.
pub fn review_sla_hours(risk_level: RiskLevel) -> i64 {
    match risk_level {
        RiskLevel::Low => 72,
        RiskLevel::Medium => 48,
        RiskLevel::High => 24,
        RiskLevel::Critical => 8,
    }
}

fn not_found(kind: &str, id: &str) -> ConvergeError {
    ConvergeError::NotFound(format!("{kind} '{id}'"))
}

fn open_task(store: &Arc<dyn ConvergeStore>, id: &str) -> Result<ReviewTask, ConvergeError> {
    let task = store.get_review_task(id)?.ok_or_else(|| not_found("review task", id))?;
    if matches!(task.status, ReviewStatus::Completed | ReviewStatus::Cancelled) {
        return Err(ConvergeError::Conflict(format!("review task '{id}' already closed")));
    }
    Ok(task)
}

pub struct Reviews {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
}

impl Reviews {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        let events = EventLog::new(store.clone());
        Reviews { store, events }
    }

    /// Creates a [`ReviewTask`] for `intent_id`; `sla_deadline` is derived
    /// from the intent's risk level. Preassigning a reviewer also emits
    /// `REVIEW_ASSIGNED` alongside `REVIEW_REQUESTED`.
    pub fn request_review(
        &self,
        task_id: impl Into<String>,
        intent_id: &str,
        trigger: &str,
        reviewer: Option<String>,
        priority: u8,
        now: DateTime<Utc>,
    ) -> Result<ReviewTask, ConvergeError> {
        let intent = self.store.get_intent(intent_id)?.ok_or_else(|| not_found("intent", intent_id))?;
        let sla_deadline = now + ChronoDuration::hours(review_sla_hours(intent.risk_level));
        let status = if reviewer.is_some() { ReviewStatus::Assigned } else { ReviewStatus::Pending };

        let task = ReviewTask {
            id: task_id.into(),
            intent_id: intent_id.to_string(),
            status,
            reviewer: reviewer.clone(),
            priority,
            sla_deadline,
            trigger: trigger.to_string(),
            resolution: None,
            notes: None,
        };
        self.store.upsert_review_task(&task)?;

        self.events.append(
            Event::new(EventType::ReviewRequested, String::new(), serde_json::json!({"trigger": trigger}))
                .with_intent(intent_id),
        )?;
        if let Some(reviewer) = &reviewer {
            self.events.append(
                Event::new(EventType::ReviewAssigned, String::new(), serde_json::json!({"reviewer": reviewer}))
                    .with_intent(intent_id),
            )?;
        }

        Ok(task)
    }

    pub fn assign_review(&self, task_id: &str, reviewer: &str) -> Result<ReviewTask, ConvergeError> {
        let mut task = open_task(&self.store, task_id)?;
        task.status = ReviewStatus::Assigned;
        task.reviewer = Some(reviewer.to_string());
        self.store.upsert_review_task(&task)?;
        self.events.append(
            Event::new(EventType::ReviewAssigned, String::new(), serde_json::json!({"reviewer": reviewer}))
                .with_intent(&task.intent_id),
        )?;
        Ok(task)
    }

    pub fn complete_review(
        &self,
        task_id: &str,
        resolution: &str,
        notes: Option<String>,
    ) -> Result<ReviewTask, ConvergeError> {
        let mut task = open_task(&self.store, task_id)?;
        task.status = ReviewStatus::Completed;
        task.resolution = Some(resolution.to_string());
        task.notes = notes.clone();
        self.store.upsert_review_task(&task)?;
        self.events.append(
            Event::new(
                EventType::ReviewCompleted,
                String::new(),
                serde_json::json!({"resolution": resolution, "notes": notes}),
            )
            .with_intent(&task.intent_id),
        )?;
        Ok(task)
    }

    pub fn cancel_review(&self, task_id: &str, reason: &str) -> Result<ReviewTask, ConvergeError> {
        let mut task = open_task(&self.store, task_id)?;
        task.status = ReviewStatus::Cancelled;
        task.notes = Some(reason.to_string());
        self.store.upsert_review_task(&task)?;
        self.events.append(
            Event::new(EventType::ReviewCancelled, String::new(), serde_json::json!({"reason": reason}))
                .with_intent(&task.intent_id),
        )?;
        Ok(task)
    }

    pub fn escalate_review(&self, task_id: &str, reason: &str) -> Result<ReviewTask, ConvergeError> {
        let mut task = open_task(&self.store, task_id)?;
        task.status = ReviewStatus::Escalated;
        self.store.upsert_review_task(&task)?;
        self.events.append(
            Event::new(EventType::ReviewEscalated, String::new(), serde_json::json!({"reason": reason}))
                .with_intent(&task.intent_id),
        )?;
        Ok(task)
    }

    /// Scans every open (pending/assigned/escalated) task and emits
    /// `REVIEW_SLA_BREACHED` for each whose deadline has passed. Returns the
    /// breached task ids; does not change task status.
    pub fn check_sla_breaches(&self, now: DateTime<Utc>) -> Result<Vec<String>, ConvergeError> {
        let mut breached = Vec::new();
        for status in [ReviewStatus::Pending, ReviewStatus::Assigned, ReviewStatus::Escalated] {
            for task in self.store.list_review_tasks(None, Some(status))? {
                if task.sla_deadline < now {
                    self.events.append(
                        Event::new(
                            EventType::ReviewSlaBreached,
                            String::new(),
                            serde_json::json!({"review_task_id": task.id, "deadline": task.sla_deadline}),
                        )
                        .with_intent(&task.intent_id),
                    )?;
                    breached.push(task.id);
                }
            }
        }
        Ok(breached)
    }

    /// Open review tasks for one intent, for dashboard display.
    pub fn review_summary(&self, intent_id: &str) -> Result<Vec<ReviewTask>, ConvergeError> {
        self.store.list_review_tasks(Some(intent_id), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_store::SqliteStore;
    use converge_types::Intent;

    fn reviews_with_intent(risk: RiskLevel) -> (Reviews, String) {
        let store: Arc<dyn ConvergeStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut intent = Intent::new("i1", "feature", "main");
        intent.risk_level = risk;
        store.upsert_intent(&intent).unwrap();
        (Reviews::new(store), "i1".to_string())
    }

    #[test]
    fn request_review_without_reviewer_is_pending() {
        let (reviews, intent_id) = reviews_with_intent(RiskLevel::Low);
        let now = converge_types::now();
        let task = reviews.request_review("t1", &intent_id, "policy_warn", None, 3, now).unwrap();
        assert_eq!(task.status, ReviewStatus::Pending);
        assert_eq!(task.sla_deadline, now + ChronoDuration::hours(72));
    }

    #[test]
    fn request_review_with_reviewer_is_assigned_and_emits_both_events() {
        let (reviews, intent_id) = reviews_with_intent(RiskLevel::Critical);
        let now = converge_types::now();
        let task = reviews
            .request_review("t1", &intent_id, "policy_warn", Some("alice".to_string()), 1, now)
            .unwrap();
        assert_eq!(task.status, ReviewStatus::Assigned);
        assert_eq!(task.sla_deadline, now + ChronoDuration::hours(8));

        let events = reviews.events.query(&converge_store::EventFilter::new().with_intent_id(&intent_id)).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn check_sla_breaches_flags_overdue_pending_tasks() {
        let (reviews, intent_id) = reviews_with_intent(RiskLevel::Critical);
        let past = converge_types::now() - ChronoDuration::hours(100);
        reviews.request_review("t1", &intent_id, "policy_warn", None, 1, past).unwrap();

        let breached = reviews.check_sla_breaches(converge_types::now()).unwrap();
        assert_eq!(breached, vec!["t1".to_string()]);
    }

    #[test]
    fn complete_review_rejects_an_already_closed_task() {
        let (reviews, intent_id) = reviews_with_intent(RiskLevel::Low);
        reviews.request_review("t1", &intent_id, "manual", None, 3, converge_types::now()).unwrap();
        reviews.complete_review("t1", "approved", None).unwrap();
        let err = reviews.complete_review("t1", "approved", None).unwrap_err();
        assert!(matches!(err, ConvergeError::Conflict(_)));
    }
}
