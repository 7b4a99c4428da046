//! Trend projections: thin `EventLog` query wrappers over time, ported from
//! `original_source/projections/trends.py`.
//!
//! Unlike `converge-projections`'s pure-compute modules, these genuinely need
//! the event log (they are a time-series read over it), so they live here
//! rather than in the pure-compute crate.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use converge_events::EventLog;
use converge_store::{ConvergeStore, EventFilter};
use converge_types::{ConvergeError, EventType};
use serde_json::Value;

pub const DEFAULT_TREND_LIMIT: i64 = 500;
pub const HEALTH_TREND_LIMIT: i64 = 200;
pub const QUERY_LIMIT_LARGE: i64 = 10_000;

fn since_days(days: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::days(days)
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RiskTrendPoint {
    pub timestamp: DateTime<Utc>,
    pub intent_id: Option<String>,
    pub risk_score: f64,
    pub damage_score: f64,
    pub entropy_score: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IntegrationMetrics {
    pub total_simulations: u64,
    pub mergeable: u64,
    pub mergeable_rate: f64,
    pub total_merged: u64,
    pub total_rejected: u64,
    pub total_blocked: u64,
    pub decision_distribution: DecisionDistribution,
    pub tenant_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DecisionDistribution {
    pub merged: u64,
    pub rejected: u64,
    pub blocked: u64,
}

pub struct Trends {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
}

impl Trends {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        let events = EventLog::new(store.clone());
        Trends { store, events }
    }

    fn filter(&self, event_type: EventType, tenant_id: Option<&str>, since: Option<DateTime<Utc>>, limit: i64) -> EventFilter {
        let mut f = EventFilter::new().with_event_type(event_type.as_str()).with_limit(limit);
        if let Some(t) = tenant_id {
            f = f.with_tenant_id(t);
        }
        f.since = since;
        f
    }

    /// Risk score time series from `RISK_EVALUATED` events.
    pub fn risk_trend(
        &self,
        tenant_id: Option<&str>,
        days: i64,
        limit: i64,
    ) -> Result<Vec<RiskTrendPoint>, ConvergeError> {
        let filter = self.filter(EventType::RiskEvaluated, tenant_id, Some(since_days(days)), limit);
        let events = self.events.query(&filter)?;
        Ok(events
            .into_iter()
            .map(|e| RiskTrendPoint {
                timestamp: e.timestamp,
                intent_id: e.intent_id,
                risk_score: e.payload["risk_score"].as_f64().unwrap_or(0.0),
                damage_score: e.payload["damage_score"].as_f64().unwrap_or(0.0),
                entropy_score: e.payload["entropic_load"].as_f64().unwrap_or(0.0),
            })
            .collect())
    }

    /// Entropy-only slice of the same `RISK_EVALUATED` stream.
    pub fn entropy_trend(
        &self,
        tenant_id: Option<&str>,
        days: i64,
        limit: i64,
    ) -> Result<Vec<(DateTime<Utc>, Option<String>, f64)>, ConvergeError> {
        let filter = self.filter(EventType::RiskEvaluated, tenant_id, Some(since_days(days)), limit);
        let events = self.events.query(&filter)?;
        Ok(events
            .into_iter()
            .map(|e| (e.timestamp, e.intent_id, e.payload["entropic_load"].as_f64().unwrap_or(0.0)))
            .collect())
    }

    /// Raw `HEALTH_SNAPSHOT` payloads, newest-filtered-by-window.
    pub fn health_trend(&self, tenant_id: Option<&str>, days: i64, limit: i64) -> Result<Vec<Value>, ConvergeError> {
        let filter = self.filter(EventType::HealthSnapshot, tenant_id, Some(since_days(days)), limit);
        Ok(self.events.query(&filter)?.into_iter().map(|e| e.payload).collect())
    }

    /// Raw `HEALTH_CHANGE_SNAPSHOT` payloads.
    pub fn change_health_trend(&self, tenant_id: Option<&str>, days: i64, limit: i64) -> Result<Vec<Value>, ConvergeError> {
        let filter = self.filter(EventType::HealthChangeSnapshot, tenant_id, Some(since_days(days)), limit);
        Ok(self.events.query(&filter)?.into_iter().map(|e| e.payload).collect())
    }

    /// Aggregate merge/reject/block counts and simulation mergeable rate,
    /// over the whole event history (no time window).
    pub fn integration_metrics(&self, tenant_id: Option<&str>) -> Result<IntegrationMetrics, ConvergeError> {
        let sims = self.events.query(&self.filter(EventType::SimulationCompleted, tenant_id, None, QUERY_LIMIT_LARGE))?;
        let merged = self.store.count_events(&self.filter(EventType::IntentMerged, tenant_id, None, QUERY_LIMIT_LARGE))?;
        let rejected = self.store.count_events(&self.filter(EventType::IntentRejected, tenant_id, None, QUERY_LIMIT_LARGE))?;
        let blocked =
            self.store.count_events(&self.filter(EventType::IntentDependencyBlocked, tenant_id, None, QUERY_LIMIT_LARGE))?;

        let total_sims = sims.len() as u64;
        let mergeable = sims.iter().filter(|e| e.payload["mergeable"].as_bool().unwrap_or(false)).count() as u64;
        let mergeable_rate = if total_sims > 0 { (mergeable as f64 / total_sims as f64 * 1000.0).round() / 1000.0 } else { 1.0 };

        Ok(IntegrationMetrics {
            total_simulations: total_sims,
            mergeable,
            mergeable_rate,
            total_merged: merged as u64,
            total_rejected: rejected as u64,
            total_blocked: blocked as u64,
            decision_distribution: DecisionDistribution {
                merged: merged as u64,
                rejected: rejected as u64,
                blocked: blocked as u64,
            },
            tenant_id: tenant_id.map(str::to_string),
            timestamp: Utc::now(),
        })
    }
}
