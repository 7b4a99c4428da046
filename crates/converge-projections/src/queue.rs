//! Queue state and agent performance projections, ported from
//! `projections/queue.py`.

use std::collections::BTreeMap;

use converge_types::{Intent, Status};

use crate::models::{AgentPerformance, PendingIntent, QueueState};

pub fn queue_state(intents: &[Intent]) -> QueueState {
    let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
    let mut pending = Vec::new();
    for intent in intents {
        let key = status_key(intent.status);
        *by_status.entry(key.to_string()).or_insert(0) += 1;
        if intent.status.is_active() {
            pending.push(PendingIntent {
                intent_id: intent.id.clone(),
                status: key.to_string(),
                priority: intent.priority,
                retries: intent.retries,
            });
        }
    }
    pending.sort_by(|a, b| (a.priority, &a.intent_id).cmp(&(b.priority, &b.intent_id)));

    QueueState { pending, total: intents.len() as u64, by_status }
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

/// Event-type counts for one agent's history (`intent.merged` / `intent.rejected` / `intent.blocked`).
pub struct AgentEventCounts {
    pub total_events: u64,
    pub merged: u64,
    pub rejected: u64,
    pub blocked: u64,
}

pub fn agent_performance(agent_id: String, counts: &AgentEventCounts, tenant_id: Option<String>) -> AgentPerformance {
    let decisions = counts.merged + counts.rejected + counts.blocked;
    let success_rate = if decisions > 0 { counts.merged as f64 / decisions as f64 } else { 0.0 };
    let success_rate = round3(success_rate);
    let trust_score = (success_rate * 100.0 + (counts.merged as f64).min(50.0)).min(100.0);

    AgentPerformance {
        agent_id,
        total_events: counts.total_events,
        merged: counts.merged,
        rejected: counts.rejected,
        blocked: counts.blocked,
        success_rate,
        trust_score: round1(trust_score),
        tenant_id,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(id: &str, status: Status, priority: u8) -> Intent {
        let mut intent = Intent::new(id, "feature", "main");
        intent.status = status;
        intent.priority = priority;
        intent
    }

    #[test]
    fn pending_excludes_terminal_statuses() {
        let intents = vec![intent("a", Status::Queued, 1), intent("b", Status::Merged, 1)];
        let state = queue_state(&intents);
        assert_eq!(state.total, 2);
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.pending[0].intent_id, "a");
    }

    #[test]
    fn pending_sorted_by_priority_then_id() {
        let intents = vec![intent("z", Status::Queued, 1), intent("a", Status::Queued, 1), intent("m", Status::Ready, 0)];
        let state = queue_state(&intents);
        let ids: Vec<&str> = state.pending.iter().map(|p| p.intent_id.as_str()).collect();
        assert_eq!(ids, vec!["m", "a", "z"]);
    }

    #[test]
    fn trust_score_caps_at_100() {
        let counts = AgentEventCounts { total_events: 200, merged: 100, rejected: 0, blocked: 0 };
        let perf = agent_performance("agent-1".to_string(), &counts, None);
        assert_eq!(perf.trust_score, 100.0);
    }
}
