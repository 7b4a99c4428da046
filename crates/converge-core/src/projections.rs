//! Store-backed assembly for `converge-projections`'s pure read models. That
//! crate computes scores from caller-supplied aggregates; this module is the
//! caller — it queries intents and events, builds each projection's
//! `*Inputs` struct, and emits the snapshot events (`HEALTH_SNAPSHOT`,
//! `HEALTH_CHANGE_SNAPSHOT`, `VERIFICATION_DEBT_SNAPSHOT`).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use converge_events::EventLog;
use converge_projections::{
    agent_performance, change_health, compliance_report, queue_state, repo_health, verification_debt,
    AgentEventCounts, AgentPerformance, ChangeHealth, ChangeHealthInputs, ComplianceInputs, ComplianceReport,
    QueueState, RepoHealth, RepoHealthInputs, VerificationDebt, VerificationInputs, VerificationParams,
};
use converge_store::{ConvergeStore, EventFilter};
use converge_types::{ComplianceThresholds, ConvergeError, Event, EventType};

const QUERY_LIMIT_LARGE: i64 = 10_000;

pub struct Projections {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
}

impl Projections {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        let events = EventLog::new(store.clone());
        Projections { store, events }
    }

    fn filter(&self, event_type: EventType, tenant_id: Option<&str>, since: Option<DateTime<Utc>>) -> EventFilter {
        let mut f = EventFilter::new().with_event_type(event_type.as_str()).with_limit(QUERY_LIMIT_LARGE);
        if let Some(t) = tenant_id {
            f = f.with_tenant_id(t);
        }
        f.since = since;
        f
    }

    pub fn queue_state(&self, tenant_id: Option<&str>) -> Result<QueueState, ConvergeError> {
        let intents = self.store.list_intents(None, tenant_id, QUERY_LIMIT_LARGE)?;
        Ok(queue_state(&intents))
    }

    /// Composite repo health from the last 24h of simulations and decisions.
    /// Emits `HEALTH_SNAPSHOT`.
    pub fn repo_health(&self, tenant_id: Option<&str>, now: DateTime<Utc>) -> Result<RepoHealth, ConvergeError> {
        let since_24h = now - ChronoDuration::hours(24);

        let sims = self.events.query(&self.filter(EventType::SimulationCompleted, tenant_id, Some(since_24h)))?;
        let total_simulations = sims.len() as u64;
        let mergeable_simulations = sims.iter().filter(|e| e.payload["mergeable"].as_bool().unwrap_or(false)).count() as u64;

        let risk_evals = self.events.query(&self.filter(EventType::RiskEvaluated, tenant_id, Some(since_24h)))?;
        let avg_entropy = if risk_evals.is_empty() {
            0.0
        } else {
            risk_evals.iter().map(|e| e.payload["entropic_load"].as_f64().unwrap_or(0.0)).sum::<f64>() / risk_evals.len() as f64
        };

        let intents = self.store.list_intents(None, tenant_id, QUERY_LIMIT_LARGE)?;
        let active_intents = intents.iter().filter(|i| i.status.is_active()).count() as u64;

        let merged_last_24h = self.store.count_events(&self.filter(EventType::IntentMerged, tenant_id, Some(since_24h)))? as u64;
        let rejected_last_24h =
            self.store.count_events(&self.filter(EventType::IntentRejected, tenant_id, Some(since_24h)))? as u64;

        let health = repo_health(
            &RepoHealthInputs { total_simulations, mergeable_simulations, avg_entropy, active_intents, merged_last_24h, rejected_last_24h },
            now,
            tenant_id.map(str::to_string),
        );

        self.events.append(Event::new(EventType::HealthSnapshot, String::new(), serde_json::to_value(&health).unwrap_or_default()))?;

        Ok(health)
    }

    /// Per-intent health from its latest risk evaluation, policy verdict,
    /// and simulation. Emits `HEALTH_CHANGE_SNAPSHOT`.
    pub fn change_health(&self, intent_id: &str) -> Result<ChangeHealth, ConvergeError> {
        let risk = self
            .events
            .query(&EventFilter::new().with_event_type(EventType::RiskEvaluated.as_str()).with_intent_id(intent_id).with_limit(1))?;
        let policy = self
            .events
            .query(&EventFilter::new().with_event_type(EventType::PolicyEvaluated.as_str()).with_intent_id(intent_id).with_limit(1))?;
        let sim = self
            .events
            .query(&EventFilter::new().with_event_type(EventType::SimulationCompleted.as_str()).with_intent_id(intent_id).with_limit(1))?;

        let risk_score = risk.first().map(|e| e.payload["risk_score"].as_f64().unwrap_or(0.0)).unwrap_or(0.0);
        let damage_score = risk.first().map(|e| e.payload["damage_score"].as_f64().unwrap_or(0.0)).unwrap_or(0.0);
        let mergeable = sim.first().map(|e| e.payload["mergeable"].as_bool().unwrap_or(true)).unwrap_or(true);
        let policy_verdict = policy.first().and_then(|e| e.payload["verdict"].as_str().map(str::to_string));

        let health = change_health(ChangeHealthInputs { intent_id: intent_id.to_string(), risk_score, damage_score, mergeable, policy_verdict });

        self.events.append(
            Event::new(EventType::HealthChangeSnapshot, String::new(), serde_json::to_value(&health).unwrap_or_default())
                .with_intent(intent_id),
        )?;

        Ok(health)
    }

    /// Five-check SLO report; tenant thresholds override the defaults when
    /// stored, else `ComplianceThresholds::default()`.
    pub fn compliance_report(&self, tenant_id: Option<&str>) -> Result<ComplianceReport, ConvergeError> {
        let thresholds = match tenant_id {
            Some(t) => self.store.get_compliance_thresholds(t)?.unwrap_or_default(),
            None => ComplianceThresholds::default(),
        };

        let sims = self.events.query(&self.filter(EventType::SimulationCompleted, tenant_id, None))?;
        let total_simulations = sims.len() as u64;
        let mergeable_simulations = sims.iter().filter(|e| e.payload["mergeable"].as_bool().unwrap_or(false)).count() as u64;

        let intents = self.store.list_intents(None, tenant_id, QUERY_LIMIT_LARGE)?;
        let retries_total: u64 = intents.iter().map(|i| i.retries as u64).sum();
        let queue_tracked = intents.iter().filter(|i| i.status.is_active()).count() as u64;

        let debt = self.verification_debt(tenant_id, Utc::now())?;

        let inputs = ComplianceInputs { total_simulations, mergeable_simulations, retries_total, queue_tracked, debt_score: debt.debt_score };
        Ok(compliance_report(&inputs, &thresholds, tenant_id.map(str::to_string)))
    }

    /// Weighted verification-debt score (§4.10). Emits
    /// `VERIFICATION_DEBT_SNAPSHOT` on every computation.
    pub fn verification_debt(&self, tenant_id: Option<&str>, now: DateTime<Utc>) -> Result<VerificationDebt, ConvergeError> {
        let params = VerificationParams::default();
        let since_24h = now - ChronoDuration::hours(24);
        let stale_before = now - ChronoDuration::hours(params.stale_hours as i64);

        let intents = self.store.list_intents(None, tenant_id, QUERY_LIMIT_LARGE)?;
        let active: Vec<_> = intents.iter().filter(|i| i.status.is_active()).collect();
        let active_count = active.len() as u64;
        let stale_count = active.iter().filter(|i| i.created_at < stale_before).count() as u64;
        let retry_count = active.iter().filter(|i| i.retries > 0).count() as u64;

        let pending_reviews = self.store.list_review_tasks(None, Some(converge_types::ReviewStatus::Pending))?.len()
            + self.store.list_review_tasks(None, Some(converge_types::ReviewStatus::Assigned))?.len();

        let sims = self.events.query(&self.filter(EventType::SimulationCompleted, tenant_id, Some(since_24h)))?;
        let total_simulations_24h = sims.len() as u64;
        let merge_conflicts_24h = sims.iter().filter(|e| !e.payload["mergeable"].as_bool().unwrap_or(true)).count() as u64;
        let semantic_conflicts_24h =
            self.store.count_events(&self.filter(EventType::SemanticConflictDetected, tenant_id, Some(since_24h)))? as u64;

        let inputs = VerificationInputs {
            active_count,
            stale_count,
            review_count: pending_reviews as u64,
            total_simulations_24h,
            merge_conflicts_24h,
            semantic_conflicts_24h,
            retry_count,
        };
        let debt = verification_debt(&inputs, &params, tenant_id.map(str::to_string));

        self.events.append(Event::new(
            EventType::VerificationDebtSnapshot,
            String::new(),
            serde_json::to_value(&debt).unwrap_or_default(),
        ))?;

        Ok(debt)
    }

    /// Per-agent trust metrics from the agent's own `intent.*` event history.
    pub fn agent_performance(&self, agent_id: &str, tenant_id: Option<&str>) -> Result<AgentPerformance, ConvergeError> {
        let mut base = |t: EventType| -> Result<EventFilter, ConvergeError> {
            let mut f = EventFilter::new().with_event_type(t.as_str()).with_limit(QUERY_LIMIT_LARGE);
            f.agent_id = Some(agent_id.to_string());
            if let Some(tenant) = tenant_id {
                f = f.with_tenant_id(tenant);
            }
            Ok(f)
        };

        let merged = self.store.count_events(&base(EventType::IntentMerged)?)? as u64;
        let rejected = self.store.count_events(&base(EventType::IntentRejected)?)? as u64;
        let blocked = self.store.count_events(&base(EventType::IntentDependencyBlocked)?)? as u64;
        let total_events = merged + rejected + blocked;

        let counts = AgentEventCounts { total_events, merged, rejected, blocked };
        Ok(agent_performance(agent_id.to_string(), &counts, tenant_id.map(str::to_string)))
    }

    /// Distinct agent ids seen across the merge/reject/block event family,
    /// for callers that want a leaderboard rather than one lookup.
    pub fn known_agents(&self, tenant_id: Option<&str>) -> Result<Vec<String>, ConvergeError> {
        let mut seen: BTreeMap<String, ()> = BTreeMap::new();
        for t in [EventType::IntentMerged, EventType::IntentRejected, EventType::IntentDependencyBlocked] {
            for e in self.events.query(&self.filter(t, tenant_id, None))? {
                if let Some(agent_id) = e.agent_id {
                    seen.insert(agent_id, ());
                }
            }
        }
        Ok(seen.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_store::SqliteStore;
    use converge_types::Intent;
    use serde_json::json;

    fn projections() -> (Projections, Arc<dyn ConvergeStore>) {
        let store: Arc<dyn ConvergeStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        (Projections::new(store.clone()), store)
    }

    #[test]
    fn queue_state_counts_active_intents() {
        let (proj, store) = projections();
        store.upsert_intent(&Intent::new("i1", "feature", "main")).unwrap();
        let state = proj.queue_state(None).unwrap();
        assert_eq!(state.total, 1);
        assert_eq!(state.pending.len(), 1);
    }

    #[test]
    fn repo_health_emits_a_snapshot_event() {
        let (proj, store) = projections();
        store.append_event(Event::new(EventType::SimulationCompleted, "t1", json!({"mergeable": true}))).unwrap();
        let health = proj.repo_health(None, Utc::now()).unwrap();
        assert_eq!(health.mergeable_rate, 1.0);

        let events = proj.events.query(&EventFilter::new().with_event_type(EventType::HealthSnapshot.as_str())).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn verification_debt_emits_a_snapshot_event_and_scores_zero_when_quiet() {
        let (proj, _store) = projections();
        let debt = proj.verification_debt(None, Utc::now()).unwrap();
        assert_eq!(debt.debt_score, 0.0);

        let events =
            proj.events.query(&EventFilter::new().with_event_type(EventType::VerificationDebtSnapshot.as_str())).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn compliance_report_uses_default_thresholds_when_tenant_has_none() {
        let (proj, _store) = projections();
        let report = proj.compliance_report(None).unwrap();
        assert!(report.passed);
    }

    #[test]
    fn agent_performance_counts_only_the_named_agent() {
        let (proj, store) = projections();
        store
            .append_event(Event::new(EventType::IntentMerged, "t1", json!({})).with_agent("agent-a"))
            .unwrap();
        store
            .append_event(Event::new(EventType::IntentMerged, "t2", json!({})).with_agent("agent-b"))
            .unwrap();

        let perf = proj.agent_performance("agent-a", None).unwrap();
        assert_eq!(perf.merged, 1);
        assert_eq!(perf.total_events, 1);
    }
}
