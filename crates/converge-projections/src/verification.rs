//! Verification debt projection, ported from `projections/verification.py`.
//!
//! Debt score (0-100) composed of 5 weighted factors: staleness (25), queue
//! depth (20), review backlog (25), conflict pressure (15), retry debt (15).

use crate::models::{status_for_debt_score, DebtBreakdown, VerificationDebt};

const W_STALENESS: f64 = 25.0;
const W_QUEUE_PRESSURE: f64 = 20.0;
const W_REVIEW_BACKLOG: f64 = 25.0;
const W_CONFLICT: f64 = 15.0;
const W_RETRY: f64 = 15.0;

pub const DEFAULT_STALE_HOURS: u32 = 24;
pub const DEFAULT_QUEUE_CAPACITY: u32 = 50;
pub const DEFAULT_REVIEW_CAPACITY: u32 = 10;

pub struct VerificationInputs {
    pub active_count: u64,
    pub stale_count: u64,
    pub review_count: u64,
    pub total_simulations_24h: u64,
    pub merge_conflicts_24h: u64,
    pub semantic_conflicts_24h: u64,
    pub retry_count: u64,
}

pub struct VerificationParams {
    pub stale_hours: u32,
    pub queue_capacity: u32,
    pub review_capacity: u32,
}

impl Default for VerificationParams {
    fn default() -> Self {
        VerificationParams {
            stale_hours: DEFAULT_STALE_HOURS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            review_capacity: DEFAULT_REVIEW_CAPACITY,
        }
    }
}

pub fn verification_debt(inputs: &VerificationInputs, params: &VerificationParams, tenant_id: Option<String>) -> VerificationDebt {
    let active_count = inputs.active_count;

    let staleness_ratio = if active_count > 0 { inputs.stale_count as f64 / active_count as f64 } else { 0.0 };
    let staleness_score = staleness_ratio.min(1.0) * W_STALENESS;

    let queue_ratio =
        if params.queue_capacity > 0 { (active_count as f64 / params.queue_capacity as f64).min(1.0) } else { 0.0 };
    let queue_pressure_score = queue_ratio * W_QUEUE_PRESSURE;

    let review_ratio =
        if params.review_capacity > 0 { (inputs.review_count as f64 / params.review_capacity as f64).min(1.0) } else { 0.0 };
    let review_backlog_score = review_ratio * W_REVIEW_BACKLOG;

    let merge_conflict_rate = if inputs.total_simulations_24h > 0 {
        inputs.merge_conflicts_24h as f64 / inputs.total_simulations_24h as f64
    } else {
        0.0
    };
    let semantic_rate = if inputs.semantic_conflicts_24h > 0 {
        (inputs.semantic_conflicts_24h as f64 / 10.0).min(1.0)
    } else {
        0.0
    };
    let conflict_rate = merge_conflict_rate * 0.7 + semantic_rate * 0.3;
    let conflict_pressure_score = conflict_rate * W_CONFLICT;

    let retry_ratio = if active_count > 0 { inputs.retry_count as f64 / active_count as f64 } else { 0.0 };
    let retry_pressure_score = retry_ratio * W_RETRY;

    let debt_score = round1(staleness_score + queue_pressure_score + review_backlog_score + conflict_pressure_score + retry_pressure_score);

    VerificationDebt {
        debt_score,
        staleness_score: round1(staleness_score),
        queue_pressure_score: round1(queue_pressure_score),
        review_backlog_score: round1(review_backlog_score),
        conflict_pressure_score: round1(conflict_pressure_score),
        retry_pressure_score: round1(retry_pressure_score),
        breakdown: DebtBreakdown {
            stale_intents: inputs.stale_count,
            active_intents: active_count,
            stale_hours_threshold: params.stale_hours,
            queue_capacity: params.queue_capacity,
            pending_reviews: inputs.review_count,
            review_capacity: params.review_capacity,
            conflict_rate: round3(conflict_rate),
            retry_intents: inputs.retry_count,
        },
        status: status_for_debt_score(debt_score),
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

    #[test]
    fn zero_activity_is_zero_debt() {
        let inputs = VerificationInputs {
            active_count: 0,
            stale_count: 0,
            review_count: 0,
            total_simulations_24h: 0,
            merge_conflicts_24h: 0,
            semantic_conflicts_24h: 0,
            retry_count: 0,
        };
        let debt = verification_debt(&inputs, &VerificationParams::default(), None);
        assert_eq!(debt.debt_score, 0.0);
        assert_eq!(debt.status, crate::models::HealthStatus::Green);
    }

    #[test]
    fn full_pressure_on_every_factor_saturates_to_100() {
        let inputs = VerificationInputs {
            active_count: 50,
            stale_count: 50,
            review_count: 10,
            total_simulations_24h: 10,
            merge_conflicts_24h: 10,
            semantic_conflicts_24h: 10,
            retry_count: 50,
        };
        let debt = verification_debt(&inputs, &VerificationParams::default(), None);
        assert_eq!(debt.debt_score, 100.0);
        assert_eq!(debt.status, crate::models::HealthStatus::Red);
    }

    #[test]
    fn conflict_pressure_blends_merge_and_semantic() {
        let inputs = VerificationInputs {
            active_count: 10,
            stale_count: 0,
            review_count: 0,
            total_simulations_24h: 10,
            merge_conflicts_24h: 10,
            semantic_conflicts_24h: 0,
            retry_count: 0,
        };
        let debt = verification_debt(&inputs, &VerificationParams::default(), None);
        assert_eq!(debt.breakdown.conflict_rate, 0.7);
    }
}
