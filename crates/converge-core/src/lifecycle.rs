//! The queue processor / lifecycle engine (§4.7): `simulate`, `validate_intent`,
//! `process_queue`, `confirm_merge`, `reset_queue`, `inspect_queue`.
//!
//! Ported from `converge`'s corresponding module functions (not present as a
//! single file in the retrieval pack — this orchestration wiring is the
//! "collaborator" layer every pure-compute crate built so far deferred to).

use std::sync::Arc;
use std::time::Duration;

use converge_auth::RiskContext;
use converge_events::EventLog;
use converge_lock::TableLock;
use converge_policy::{default_profile, evaluate as evaluate_policy, Profile, Verdict};
use converge_risk::{evaluate_risk, RiskEval};
use converge_scm::ScmPort;
use converge_store::{ConvergeStore, EventFilter};
use converge_types::payloads::{
    BlockPayload, CheckPayload, MergeFailedPayload, MergePayload, PolicyPayload, RejectPayload, SimulationPayload,
};
use converge_types::{ConvergeError, Event, EventType, Intent, RiskPolicy, Simulation, Status};

use crate::agents::Agents;
use crate::projections::Projections;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const QUEUE_LOCK_NAME: &str = "queue";

pub struct Engine {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
    lock: TableLock,
    scm: Arc<dyn ScmPort>,
    agents: Agents,
    projections: Projections,
}

#[derive(Debug, Clone)]
pub struct ValidateOutcome {
    pub simulation: Simulation,
    pub risk: RiskEval,
    pub policy: converge_policy::PolicyEvaluation,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct QueueDecision {
    pub intent_id: String,
    pub decision: QueueDecisionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueDecisionKind {
    Merged { commit: String },
    Requeued { retries: u32, error: String },
    Rejected { retries: u32, error: String },
    DependencyBlocked { unmet: Vec<String> },
    PolicyBlocked { reasons: Vec<String> },
    AuthorizationDenied { reasons: Vec<String> },
}

/// What `process_queue` needs to decide merge eligibility and retry
/// behavior for one candidate intent, beyond what's already on `Intent`.
pub struct DrainOptions<'a> {
    pub target: &'a str,
    pub auto_confirm: bool,
    pub max_retries: u32,
    /// Reuse a READY candidate's last recorded simulation instead of
    /// re-running it through the SCM port.
    pub use_last_sim: bool,
    /// Skip re-checking external check results; validate on simulation and
    /// risk/policy alone.
    pub skip_checks: bool,
}

impl Default for DrainOptions<'_> {
    fn default() -> Self {
        DrainOptions {
            target: "main",
            auto_confirm: true,
            max_retries: DEFAULT_MAX_RETRIES,
            use_last_sim: true,
            skip_checks: true,
        }
    }
}

fn scm_err(e: anyhow::Error) -> ConvergeError {
    ConvergeError::Scm(e.to_string())
}

fn not_found(kind: &str, id: &str) -> ConvergeError {
    ConvergeError::NotFound(format!("{kind} '{id}'"))
}

impl Engine {
    pub fn new(store: Arc<dyn ConvergeStore>, scm: Arc<dyn ScmPort>) -> Self {
        let events = EventLog::new(store.clone());
        let lock = TableLock::new(store.clone());
        let agents = Agents::new(store.clone());
        let projections = Projections::new(store.clone());
        Engine { store, events, lock, scm, agents, projections }
    }

    /// `simulate(source, target, intent_id?)`: dry-run merge via the SCM
    /// port, always recorded as `SIMULATION_COMPLETED` regardless of outcome.
    pub fn simulate(&self, source: &str, target: &str, intent_id: Option<&str>) -> Result<Simulation, ConvergeError> {
        let simulation = self.scm.simulate_merge(source, target).map_err(scm_err)?;

        let payload = SimulationPayload {
            mergeable: simulation.mergeable,
            conflicts: simulation.conflicts.clone(),
            files_changed: simulation.files_changed.clone(),
            source: simulation.source.clone(),
            target: simulation.target.clone(),
        };
        let mut event = Event::new(EventType::SimulationCompleted, String::new(), payload.to_value());
        if let Some(id) = intent_id {
            event = event.with_intent(id);
        }
        self.events.append(event)?;

        Ok(simulation)
    }

    fn last_simulation(&self, intent_id: &str) -> Result<Option<Simulation>, ConvergeError> {
        let filter = EventFilter::new()
            .with_intent_id(intent_id)
            .with_event_type(EventType::SimulationCompleted.as_str())
            .with_limit(1);
        let events = self.events.query(&filter)?;
        match events.into_iter().next() {
            Some(e) => serde_json::from_value(e.payload)
                .map(Some)
                .map_err(|err| ConvergeError::Invalid(format!("corrupt simulation payload: {err}"))),
            None => Ok(None),
        }
    }

    /// Most recent recorded result per named check, newest first per the
    /// event log's default ordering, deduplicated by check name.
    fn last_check_results(&self, intent_id: &str) -> Result<Vec<(String, bool)>, ConvergeError> {
        let filter = EventFilter::new().with_intent_id(intent_id).with_event_type(EventType::CheckCompleted.as_str());
        let events = self.events.query(&filter)?;
        let mut seen = std::collections::BTreeSet::new();
        let mut results = Vec::new();
        for event in events {
            if let Some(name) = event.payload["name"].as_str() {
                if seen.insert(name.to_string()) {
                    results.push((name.to_string(), event.payload["passed"].as_bool().unwrap_or(false)));
                }
            }
        }
        Ok(results)
    }

    /// `risk_score`/`damage_score` from the intent's latest `RISK_EVALUATED`
    /// event, read directly off the payload rather than a typed
    /// deserialization (`RiskEval` has no `Deserialize` impl).
    fn latest_risk_scores(&self, intent_id: &str) -> Result<Option<(f64, f64)>, ConvergeError> {
        let filter = EventFilter::new()
            .with_intent_id(intent_id)
            .with_event_type(EventType::RiskEvaluated.as_str())
            .with_limit(1);
        let events = self.events.query(&filter)?;
        Ok(events.into_iter().next().map(|e| {
            (e.payload["risk_score"].as_f64().unwrap_or(0.0), e.payload["damage_score"].as_f64().unwrap_or(0.0))
        }))
    }

    /// `validate_intent`: simulate (or reuse the last simulation), score
    /// risk, evaluate policy gates, and transition READY → VALIDATED/BLOCKED.
    pub fn validate_intent(
        &self,
        intent_id: &str,
        check_results: &[(String, bool)],
        use_last_sim: bool,
        risk_policy: &RiskPolicy,
        profile: &Profile,
    ) -> Result<ValidateOutcome, ConvergeError> {
        let intent = self.store.get_intent(intent_id)?.ok_or_else(|| not_found("intent", intent_id))?;

        let simulation = if use_last_sim {
            match self.last_simulation(intent_id)? {
                Some(sim) => sim,
                None => self.simulate(&intent.source, &intent.target, Some(intent_id))?,
            }
        } else {
            self.simulate(&intent.source, &intent.target, Some(intent_id))?
        };

        for (name, passed) in check_results {
            let payload = CheckPayload { name: name.clone(), passed: *passed, detail: None };
            self.events.append(Event::new(EventType::CheckCompleted, String::new(), payload.to_value()).with_intent(intent_id))?;
        }

        let risk = evaluate_risk(&intent, &simulation, risk_policy);
        self.events.append(
            Event::new(EventType::RiskEvaluated, String::new(), serde_json::to_value(&risk).unwrap_or_default())
                .with_intent(intent_id),
        )?;

        let policy = evaluate_policy(&risk, profile, check_results);
        let policy_payload = PolicyPayload {
            verdict: policy.verdict.to_string(),
            gates: policy.gates.clone(),
            mode: "enforce".to_string(),
        };
        self.events.append(
            Event::new(EventType::PolicyEvaluated, String::new(), policy_payload.to_value()).with_intent(intent_id),
        )?;

        let status = match policy.verdict {
            Verdict::Block => Status::Blocked,
            Verdict::Pass | Verdict::Warn => Status::Validated,
        };
        self.store.update_intent_status(intent_id, status, None)?;

        Ok(ValidateOutcome { simulation, risk, policy, status })
    }

    /// An intent is eligible for draining only when every declared
    /// dependency exists and is `MERGED`.
    fn unmet_dependencies(&self, intent: &Intent) -> Result<Vec<String>, ConvergeError> {
        let mut unmet = Vec::new();
        for dep in &intent.dependencies {
            match self.store.get_intent(dep)? {
                Some(d) if d.status == Status::Merged => {}
                _ => unmet.push(dep.clone()),
            }
        }
        Ok(unmet)
    }

    /// `process_queue`: drains the READY/VALIDATED/QUEUED backlog once. The
    /// queue lock guards the whole pass; an uncontended lock yields an empty
    /// result without side effects.
    pub fn process_queue(&self, limit: usize, options: &DrainOptions) -> Result<Vec<QueueDecision>, ConvergeError> {
        let result = self.lock.with_lock(QUEUE_LOCK_NAME, Duration::from_secs(300), || self.drain(limit, options))?;
        match &result {
            Some(decisions) => tracing::info!(count = decisions.len(), "queue drain completed"),
            None => tracing::debug!("queue lock contended, skipping drain"),
        }
        Ok(result.unwrap_or_default())
    }

    fn drain(&self, limit: usize, options: &DrainOptions) -> Result<Vec<QueueDecision>, ConvergeError> {
        let mut candidates = Vec::new();
        for status in [Status::Ready, Status::Validated, Status::Queued] {
            candidates.extend(self.store.list_intents(Some(status), None, i64::MAX)?);
        }
        candidates.sort_by(|a, b| (a.priority, &a.id).cmp(&(b.priority, &b.id)));

        let mut decisions = Vec::new();
        for mut intent in candidates.into_iter().take(limit) {
            let unmet = self.unmet_dependencies(&intent)?;
            if !unmet.is_empty() {
                let payload = BlockPayload { unmet: unmet.clone() };
                self.events.append(
                    Event::new(EventType::IntentDependencyBlocked, String::new(), payload.to_value())
                        .with_intent(&intent.id),
                )?;
                decisions.push(QueueDecision { intent_id: intent.id, decision: QueueDecisionKind::DependencyBlocked { unmet } });
                continue;
            }

            let mut risk_scores = None;
            if intent.status == Status::Ready {
                let tenant_id = intent.tenant_id.clone().unwrap_or_default();
                let risk_policy = self.store.get_risk_policy(&tenant_id)?.unwrap_or_default();
                let mut profile = default_profile(intent.risk_level);
                let check_results = if options.skip_checks {
                    profile.checks.clear();
                    Vec::new()
                } else {
                    self.last_check_results(&intent.id)?
                };
                let outcome =
                    self.validate_intent(&intent.id, &check_results, options.use_last_sim, &risk_policy, &profile)?;

                if outcome.status == Status::Blocked {
                    let reasons = outcome.policy.gates.iter().filter(|g| !g.passed).map(|g| g.reason.clone()).collect();
                    decisions.push(QueueDecision { intent_id: intent.id, decision: QueueDecisionKind::PolicyBlocked { reasons } });
                    continue;
                }
                risk_scores = Some((outcome.risk.risk_score, outcome.risk.damage_score));
                intent.status = outcome.status;
            }

            if let Some(agent_id) = intent.created_by.clone() {
                let (risk_score, damage_score) = match risk_scores {
                    Some(scores) => scores,
                    None => self.latest_risk_scores(&intent.id)?.unwrap_or((0.0, 0.0)),
                };
                let compliance_passing = self.projections.compliance_report(intent.tenant_id.as_deref()).ok().map(|r| r.passed);
                let result = self.agents.authorize_action(
                    &agent_id,
                    "merge",
                    &intent.id,
                    intent.tenant_id.as_deref(),
                    Some(intent.risk_level),
                    Some(RiskContext { risk_score, damage_score }),
                    compliance_passing,
                    0,
                    converge_types::now(),
                )?;
                if !result.allowed {
                    decisions.push(QueueDecision {
                        intent_id: intent.id,
                        decision: QueueDecisionKind::AuthorizationDenied { reasons: result.reasons },
                    });
                    continue;
                }
            }

            if intent.status != Status::Queued {
                self.store.update_intent_status(&intent.id, Status::Queued, None)?;
            }

            let merge_result = self.scm.execute_merge_safe(&intent.source, options.target);
            match merge_result {
                Ok(commit) if options.auto_confirm => {
                    self.confirm_merge(&intent.id, Some(commit.clone()))?;
                    decisions.push(QueueDecision { intent_id: intent.id, decision: QueueDecisionKind::Merged { commit } });
                }
                Ok(_) => {
                    decisions.push(QueueDecision {
                        intent_id: intent.id,
                        decision: QueueDecisionKind::Requeued { retries: intent.retries, error: String::new() },
                    });
                }
                Err(err) => {
                    decisions.push(self.handle_merge_failure(&intent, &err.to_string(), options.max_retries)?);
                }
            }
        }
        Ok(decisions)
    }

    fn handle_merge_failure(&self, intent: &Intent, error: &str, max_retries: u32) -> Result<QueueDecision, ConvergeError> {
        if intent.retries + 1 >= max_retries {
            let retries = intent.retries + 1;
            self.store.update_intent_status(&intent.id, Status::Rejected, Some(retries))?;
            let payload = RejectPayload { reason: error.to_string(), retries };
            self.events.append(
                Event::new(EventType::IntentRejected, String::new(), payload.to_value()).with_intent(&intent.id),
            )?;
            Ok(QueueDecision { intent_id: intent.id.clone(), decision: QueueDecisionKind::Rejected { retries, error: error.to_string() } })
        } else {
            let retries = intent.retries + 1;
            self.store.update_intent_status(&intent.id, Status::Validated, Some(retries))?;
            let payload = MergeFailedPayload { error: error.to_string(), retries };
            self.events.append(
                Event::new(EventType::IntentRequeued, String::new(), payload.to_value()).with_intent(&intent.id),
            )?;
            Ok(QueueDecision { intent_id: intent.id.clone(), decision: QueueDecisionKind::Requeued { retries, error: error.to_string() } })
        }
    }

    /// `confirm_merge`: finalize a QUEUED intent as MERGED.
    pub fn confirm_merge(&self, intent_id: &str, merged_commit: Option<String>) -> Result<(), ConvergeError> {
        self.store.update_intent_status(intent_id, Status::Merged, None)?;
        let payload = MergePayload { merged_commit: merged_commit.unwrap_or_default() };
        self.events.append(Event::new(EventType::IntentMerged, String::new(), payload.to_value()).with_intent(intent_id))?;
        Ok(())
    }

    /// `reset_queue`: operator escape hatch — force a status and optionally
    /// clear the lock a stuck drain left behind.
    pub fn reset_queue(&self, intent_id: &str, set_status: Option<Status>, clear_lock: bool) -> Result<(), ConvergeError> {
        if let Some(status) = set_status {
            self.store.update_intent_status(intent_id, status, None)?;
            self.events.append(
                Event::new(EventType::QueueReset, String::new(), serde_json::json!({"status": status_key(status)}))
                    .with_intent(intent_id),
            )?;
        }
        if clear_lock {
            self.lock.force_release(QUEUE_LOCK_NAME)?;
        }
        Ok(())
    }

    /// `inspect_queue`: current intents in the given status (or every
    /// pending status when `None`), store-filtered, no event emitted.
    pub fn inspect_queue(&self, status: Option<Status>, tenant_id: Option<&str>) -> Result<Vec<Intent>, ConvergeError> {
        match status {
            Some(s) => self.store.list_intents(Some(s), tenant_id, i64::MAX),
            None => {
                let mut all = Vec::new();
                for s in [Status::Ready, Status::Validated, Status::Queued] {
                    all.extend(self.store.list_intents(Some(s), tenant_id, i64::MAX)?);
                }
                all.sort_by(|a, b| (a.priority, &a.id).cmp(&(b.priority, &b.id)));
                Ok(all)
            }
        }
    }
}

fn status_key(status: Status) -> &'static str {
    match status {
        Status::Ready => "ready",
        Status::Validated => "validated",
        Status::Queued => "queued",
        Status::Merged => "merged",
        Status::Rejected => "rejected",
        Status::Blocked => "blocked",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_scm::ScmPort;
    use converge_store::SqliteStore;
    use converge_types::{ConvergeResult, Intent as TypesIntent};

    struct FakeScm {
        mergeable: bool,
    }

    impl ScmPort for FakeScm {
        fn simulate_merge(&self, source: &str, target: &str) -> anyhow::Result<Simulation> {
            Ok(Simulation {
                mergeable: self.mergeable,
                conflicts: if self.mergeable { vec![] } else { vec!["conflict.rs".to_string()] },
                files_changed: vec!["a.rs".to_string()],
                source: source.to_string(),
                target: target.to_string(),
                timestamp: converge_types::now(),
            })
        }

        fn execute_merge_safe(&self, _source: &str, _target: &str) -> anyhow::Result<String> {
            if self.mergeable {
                Ok("deadbeef".to_string())
            } else {
                Err(anyhow::anyhow!("merge conflict"))
            }
        }

        fn log_entries(&self, _max_commits: usize) -> anyhow::Result<Vec<converge_scm::LogEntry>> {
            Ok(Vec::new())
        }
    }

    fn engine(mergeable: bool) -> Engine {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        Engine::new(store, Arc::new(FakeScm { mergeable }))
    }

    fn seed_intent(engine: &Engine, id: &str, priority: u8) -> ConvergeResult<()> {
        let mut intent = TypesIntent::new(id, "feature", "main");
        intent.priority = priority;
        intent.status = Status::Validated;
        engine.store.upsert_intent(&intent)
    }

    #[test]
    fn simulate_records_an_event() {
        let engine = engine(true);
        let sim = engine.simulate("feature", "main", Some("i1")).unwrap();
        assert!(sim.mergeable);
        let events = engine.events.query(&EventFilter::new().with_intent_id("i1")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::SimulationCompleted);
    }

    #[test]
    fn drain_merges_a_clean_intent() {
        let engine = engine(true);
        seed_intent(&engine, "i1", 1).unwrap();
        let decisions = engine.process_queue(10, &DrainOptions::default()).unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(matches!(decisions[0].decision, QueueDecisionKind::Merged { .. }));
        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Merged);
    }

    /// An empty diff: no files touched, so every risk signal is trivially
    /// zero and every gate in every profile passes regardless of its
    /// threshold. Isolates the drain/validate wiring from risk-graph math.
    struct EmptyDiffScm;

    impl ScmPort for EmptyDiffScm {
        fn simulate_merge(&self, source: &str, target: &str) -> anyhow::Result<Simulation> {
            Ok(Simulation {
                mergeable: true,
                conflicts: Vec::new(),
                files_changed: Vec::new(),
                source: source.to_string(),
                target: target.to_string(),
                timestamp: converge_types::now(),
            })
        }

        fn execute_merge_safe(&self, _source: &str, _target: &str) -> anyhow::Result<String> {
            Ok("deadbeef".to_string())
        }

        fn log_entries(&self, _max_commits: usize) -> anyhow::Result<Vec<converge_scm::LogEntry>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn drain_validates_a_fresh_ready_intent_before_merging() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = Engine::new(store, Arc::new(EmptyDiffScm));
        let intent = TypesIntent::new("i1", "feature", "main");
        engine.store.upsert_intent(&intent).unwrap();

        let decisions = engine.process_queue(10, &DrainOptions::default()).unwrap();
        assert_eq!(decisions.len(), 1);
        assert!(matches!(decisions[0].decision, QueueDecisionKind::Merged { .. }));

        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Merged);

        let events = engine.events.query(&EventFilter::new().with_intent_id("i1").with_limit(10)).unwrap();
        let types: Vec<_> = events.iter().rev().map(|e| e.event_type.clone()).collect();
        assert_eq!(
            types,
            vec![EventType::SimulationCompleted, EventType::RiskEvaluated, EventType::PolicyEvaluated, EventType::IntentMerged]
        );
    }

    #[test]
    fn drain_blocks_a_ready_intent_missing_a_required_check() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = Engine::new(store, Arc::new(EmptyDiffScm));
        let intent = TypesIntent::new("i1", "feature", "main");
        engine.store.upsert_intent(&intent).unwrap();

        let options = DrainOptions { skip_checks: false, ..DrainOptions::default() };
        let decisions = engine.process_queue(10, &options).unwrap();
        assert!(matches!(decisions[0].decision, QueueDecisionKind::PolicyBlocked { .. }));

        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Blocked, "the low profile's required `lint` check was never recorded");
    }

    #[test]
    fn drain_denies_an_agent_intent_the_default_policy_does_not_allow_to_merge() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = Engine::new(store, Arc::new(EmptyDiffScm));
        let mut intent = TypesIntent::new("i1", "feature", "main");
        intent.created_by = Some("bot-1".to_string());
        engine.store.upsert_intent(&intent).unwrap();

        let decisions = engine.process_queue(10, &DrainOptions::default()).unwrap();
        assert!(matches!(decisions[0].decision, QueueDecisionKind::AuthorizationDenied { .. }));

        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Validated, "authorization denial leaves the intent queued for retry, not merged");
    }

    #[test]
    fn drain_rejects_after_max_retries() {
        let engine = engine(false);
        seed_intent(&engine, "i1", 1).unwrap();
        let options = DrainOptions { max_retries: 1, ..DrainOptions::default() };
        let decisions = engine.process_queue(10, &options).unwrap();
        assert!(matches!(decisions[0].decision, QueueDecisionKind::Rejected { .. }));
        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Rejected);
    }

    #[test]
    fn drain_blocks_on_unmet_dependency() {
        let engine = engine(true);
        let mut intent = TypesIntent::new("i1", "feature", "main");
        intent.status = Status::Validated;
        intent.dependencies = vec!["missing".to_string()];
        engine.store.upsert_intent(&intent).unwrap();

        let decisions = engine.process_queue(10, &DrainOptions::default()).unwrap();
        assert!(matches!(decisions[0].decision, QueueDecisionKind::DependencyBlocked { .. }));
        let intent = engine.store.get_intent("i1").unwrap().unwrap();
        assert_eq!(intent.status, Status::Validated, "status is not changed when blocked on a dependency");
    }

    #[test]
    fn lock_contention_yields_empty_result() {
        let engine = engine(true);
        seed_intent(&engine, "i1", 1).unwrap();
        engine.lock.acquire(QUEUE_LOCK_NAME, Duration::from_secs(60)).unwrap();
        let decisions = engine.process_queue(10, &DrainOptions::default()).unwrap();
        assert!(decisions.is_empty());
    }
}
