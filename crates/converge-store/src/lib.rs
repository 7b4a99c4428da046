//! The `Store` trait: the composite persistence capability set every other
//! Converge component depends on, plus a SQLite-backed implementation.
//!
//! The trait is split from its implementation: application code depends on
//! `Store`, never on `SqliteStore` directly, so a future Postgres adapter is
//! a drop-in replacement.

mod dialect;
mod schema;
mod sqlite;

pub use dialect::{PostgresDialect, SqliteDialect, StoreDialect};

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use converge_types::{
    AgentPolicy, ChainState, CommitLink, ComplianceThresholds, ConvergeError, Embedding, Event,
    Intent, QueueLock, ReviewStatus, ReviewTask, RiskPolicy, SecurityFinding, Status,
};

pub use sqlite::SqliteStore;

/// Filters accepted by [`ConvergeStore::query_events`] / `count_events`.
/// All fields are optional; `None` means "no filter on this column."
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub intent_id: Option<String>,
    pub agent_id: Option<String>,
    pub tenant_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        EventFilter {
            limit: 200,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_intent_id(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// The composite persistence capability set. Implementations must be
/// `Send + Sync`: multiple workers share one store value behind an `Arc`.
pub trait ConvergeStore: Send + Sync {
    // -- Events -----------------------------------------------------------
    fn append_event(&self, event: Event) -> Result<Event, ConvergeError>;
    fn query_events(&self, filter: &EventFilter) -> Result<Vec<Event>, ConvergeError>;
    fn count_events(&self, filter: &EventFilter) -> Result<i64, ConvergeError>;
    /// Deletes events older than `before`. Never deletes events at or after
    /// it. Returns the count that were (or would be, if `dry_run`) deleted.
    fn prune_events(
        &self,
        before: DateTime<Utc>,
        tenant_id: Option<&str>,
        dry_run: bool,
    ) -> Result<i64, ConvergeError>;

    // -- Intents ------------------------------------------------------------
    fn upsert_intent(&self, intent: &Intent) -> Result<(), ConvergeError>;
    fn get_intent(&self, intent_id: &str) -> Result<Option<Intent>, ConvergeError>;
    fn list_intents(
        &self,
        status: Option<Status>,
        tenant_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Intent>, ConvergeError>;
    fn update_intent_status(
        &self,
        intent_id: &str,
        status: Status,
        retries: Option<u32>,
    ) -> Result<(), ConvergeError>;

    // -- Policies -----------------------------------------------------------
    fn upsert_agent_policy(&self, policy: &AgentPolicy) -> Result<(), ConvergeError>;
    fn get_agent_policy(
        &self,
        agent_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<Option<AgentPolicy>, ConvergeError>;
    fn list_agent_policies(&self, tenant_id: Option<&str>) -> Result<Vec<AgentPolicy>, ConvergeError>;

    fn upsert_risk_policy(&self, tenant_id: &str, policy: &RiskPolicy) -> Result<(), ConvergeError>;
    fn get_risk_policy(&self, tenant_id: &str) -> Result<Option<RiskPolicy>, ConvergeError>;

    fn upsert_compliance_thresholds(
        &self,
        tenant_id: &str,
        thresholds: &ComplianceThresholds,
    ) -> Result<(), ConvergeError>;
    fn get_compliance_thresholds(
        &self,
        tenant_id: &str,
    ) -> Result<Option<ComplianceThresholds>, ConvergeError>;

    // -- Commit links ---------------------------------------------------------
    fn upsert_commit_link(&self, link: &CommitLink) -> Result<(), ConvergeError>;
    fn list_commit_links(&self, intent_id: &str) -> Result<Vec<CommitLink>, ConvergeError>;

    // -- Embeddings -----------------------------------------------------------
    fn upsert_embedding(&self, embedding: &Embedding) -> Result<(), ConvergeError>;
    fn get_embedding(&self, intent_id: &str, model: &str) -> Result<Option<Embedding>, ConvergeError>;
    fn list_embeddings(&self, model: &str) -> Result<Vec<Embedding>, ConvergeError>;
    fn delete_embedding(&self, intent_id: &str, model: &str) -> Result<(), ConvergeError>;

    // -- Locking -----------------------------------------------------------
    fn acquire_queue_lock(
        &self,
        lock_name: &str,
        holder_pid: i64,
        ttl: Duration,
    ) -> Result<bool, ConvergeError>;
    fn release_queue_lock(&self, lock_name: &str, holder_pid: i64) -> Result<bool, ConvergeError>;
    fn force_release_queue_lock(&self, lock_name: &str) -> Result<bool, ConvergeError>;
    fn get_queue_lock_info(&self, lock_name: &str) -> Result<Option<QueueLock>, ConvergeError>;

    // -- Delivery dedup -----------------------------------------------------
    fn is_duplicate_delivery(&self, delivery_id: &str) -> Result<bool, ConvergeError>;
    fn record_delivery(&self, delivery_id: &str, ttl: Duration) -> Result<(), ConvergeError>;

    // -- Audit chain ---------------------------------------------------------
    fn get_chain_state(&self, chain_id: &str) -> Result<Option<ChainState>, ConvergeError>;
    fn save_chain_state(&self, state: &ChainState) -> Result<(), ConvergeError>;

    // -- Reviews -----------------------------------------------------------
    fn upsert_review_task(&self, task: &ReviewTask) -> Result<(), ConvergeError>;
    fn get_review_task(&self, id: &str) -> Result<Option<ReviewTask>, ConvergeError>;
    fn list_review_tasks(
        &self,
        intent_id: Option<&str>,
        status: Option<ReviewStatus>,
    ) -> Result<Vec<ReviewTask>, ConvergeError>;

    // -- Security findings ----------------------------------------------------
    fn upsert_security_finding(&self, finding: &SecurityFinding) -> Result<(), ConvergeError>;
    fn count_findings_by_severity(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<BTreeMap<String, i64>, ConvergeError>;

    fn close(&self) -> Result<(), ConvergeError>;
}
