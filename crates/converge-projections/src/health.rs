//! Repo- and change-level health composites.
//!
//! `health.py` is not present in the retrieval pack; these composites are
//! authored from the projection's documented inputs (mergeable rate, average
//! entropy, active intent count, 24h merge/reject counts for repo health;
//! latest risk+policy+simulation for change health) using the same weighted
//! scoring idiom as `verification::verification_debt`.

use chrono::{DateTime, Utc};

use crate::models::{status_for_health_score, ChangeHealth, HealthStatus, RepoHealth};

const W_MERGEABLE: f64 = 40.0;
const W_ENTROPY: f64 = 30.0;
const W_DECISION_BALANCE: f64 = 15.0;
const W_QUEUE_PRESSURE: f64 = 15.0;

/// Entropy average at or above this is treated as maximally unhealthy.
const ENTROPY_SATURATION: f64 = 40.0;
/// Active intent count at or above this is treated as maximally congested.
const ACTIVE_INTENT_SATURATION: f64 = 50.0;

pub struct RepoHealthInputs {
    pub total_simulations: u64,
    pub mergeable_simulations: u64,
    pub avg_entropy: f64,
    pub active_intents: u64,
    pub merged_last_24h: u64,
    pub rejected_last_24h: u64,
}

pub fn repo_health(inputs: &RepoHealthInputs, timestamp: DateTime<Utc>, tenant_id: Option<String>) -> RepoHealth {
    let mergeable_rate =
        if inputs.total_simulations > 0 { inputs.mergeable_simulations as f64 / inputs.total_simulations as f64 } else { 1.0 };
    let conflict_rate = 1.0 - mergeable_rate;

    let entropy_component = 1.0 - (inputs.avg_entropy / ENTROPY_SATURATION).min(1.0).max(0.0);

    let decisions = inputs.merged_last_24h + inputs.rejected_last_24h;
    let decision_balance = if decisions > 0 { inputs.merged_last_24h as f64 / decisions as f64 } else { 1.0 };

    let queue_component = 1.0 - (inputs.active_intents as f64 / ACTIVE_INTENT_SATURATION).min(1.0);

    let repo_health_score = round1(
        mergeable_rate * W_MERGEABLE
            + entropy_component * W_ENTROPY
            + decision_balance * W_DECISION_BALANCE
            + queue_component * W_QUEUE_PRESSURE,
    );

    RepoHealth {
        repo_health_score,
        entropy_score: round1(inputs.avg_entropy),
        mergeable_rate: round3(mergeable_rate),
        conflict_rate: round3(conflict_rate),
        active_intents: inputs.active_intents,
        merged_last_24h: inputs.merged_last_24h,
        rejected_last_24h: inputs.rejected_last_24h,
        status: status_for_health_score(repo_health_score),
        timestamp,
        tenant_id,
    }
}

pub struct ChangeHealthInputs {
    pub intent_id: String,
    pub risk_score: f64,
    pub damage_score: f64,
    pub mergeable: bool,
    pub policy_verdict: Option<String>,
}

pub fn change_health(inputs: ChangeHealthInputs) -> ChangeHealth {
    let status = if !inputs.mergeable || inputs.policy_verdict.as_deref() == Some("block") {
        HealthStatus::Red
    } else if inputs.policy_verdict.as_deref() == Some("warn") {
        HealthStatus::Yellow
    } else {
        status_for_health_score(100.0 - inputs.risk_score.max(inputs.damage_score))
    };

    ChangeHealth {
        intent_id: inputs.intent_id,
        risk_score: inputs.risk_score,
        damage_score: inputs.damage_score,
        mergeable: inputs.mergeable,
        policy_verdict: inputs.policy_verdict,
        status,
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

    #[test]
    fn healthy_quiet_repo_scores_green() {
        let inputs = RepoHealthInputs {
            total_simulations: 10,
            mergeable_simulations: 10,
            avg_entropy: 0.0,
            active_intents: 0,
            merged_last_24h: 5,
            rejected_last_24h: 0,
        };
        let health = repo_health(&inputs, Utc::now(), None);
        assert_eq!(health.status, HealthStatus::Green);
        assert_eq!(health.repo_health_score, 100.0);
    }

    #[test]
    fn saturated_entropy_and_queue_scores_low() {
        let inputs = RepoHealthInputs {
            total_simulations: 10,
            mergeable_simulations: 0,
            avg_entropy: 100.0,
            active_intents: 200,
            merged_last_24h: 0,
            rejected_last_24h: 10,
        };
        let health = repo_health(&inputs, Utc::now(), None);
        assert_eq!(health.repo_health_score, 0.0);
        assert_eq!(health.status, HealthStatus::Red);
    }

    #[test]
    fn unmergeable_change_is_red_regardless_of_risk() {
        let change = change_health(ChangeHealthInputs {
            intent_id: "i1".to_string(),
            risk_score: 5.0,
            damage_score: 5.0,
            mergeable: false,
            policy_verdict: Some("pass".to_string()),
        });
        assert_eq!(change.status, HealthStatus::Red);
    }

    #[test]
    fn low_risk_mergeable_change_is_green() {
        let change = change_health(ChangeHealthInputs {
            intent_id: "i1".to_string(),
            risk_score: 5.0,
            damage_score: 5.0,
            mergeable: true,
            policy_verdict: Some("pass".to_string()),
        });
        assert_eq!(change.status, HealthStatus::Green);
    }
}
