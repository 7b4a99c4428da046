//! The risk gate: three fixed checks against `RiskPolicy` thresholds, with
//! shadow/enforce rollout modes and deterministic gradual-rollout bucketing.
//! Constants (`ROLLOUT_HASH_CHARS`, `ROLLOUT_DIVISOR`, the three checks'
//! names/limits) are ported from the reference's `defaults.py`.

use converge_types::payloads::GatePayload;
use sha2::{Digest, Sha256};

use crate::evaluate::Verdict;

pub const MAX_RISK_SCORE: f64 = 65.0;
pub const MAX_DAMAGE_SCORE: f64 = 60.0;
pub const MAX_PROPAGATION_SCORE: f64 = 55.0;

const ROLLOUT_HASH_CHARS: usize = 8;
const ROLLOUT_DIVISOR: u64 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutMode {
    Shadow,
    Enforce { percent: u8 },
}

/// Hashes `intent_id` with SHA-256, takes the first `ROLLOUT_HASH_CHARS` hex
/// digits as a big-endian integer, and divides by `ROLLOUT_DIVISOR` to get a
/// value in `[0, 1)`. Deterministic per intent so repeated evaluations of
/// the same intent land in the same bucket.
pub fn rollout_bucket(intent_id: &str) -> f64 {
    let digest = Sha256::digest(intent_id.as_bytes());
    let hex = hex::encode(digest);
    let prefix = &hex[..ROLLOUT_HASH_CHARS];
    let value = u64::from_str_radix(prefix, 16).unwrap_or(0);
    value as f64 / ROLLOUT_DIVISOR as f64
}

fn in_rollout(intent_id: &str, percent: u8) -> bool {
    rollout_bucket(intent_id) < (percent as f64 / 100.0)
}

pub struct RiskGateResult {
    pub verdict: Verdict,
    pub gates: Vec<GatePayload>,
    pub enforced: bool,
}

/// Evaluates the three risk-gate checks. In `Shadow` mode the verdict is
/// always recorded but never enforced; in `Enforce` mode it's only enforced
/// for intents selected by the rollout percentage.
pub fn evaluate_risk_gate(
    intent_id: &str,
    risk_score: f64,
    damage_score: f64,
    propagation_score: f64,
    mode: RolloutMode,
) -> RiskGateResult {
    let checks = [
        ("risk_score", risk_score, MAX_RISK_SCORE),
        ("damage_score", damage_score, MAX_DAMAGE_SCORE),
        ("propagation_score", propagation_score, MAX_PROPAGATION_SCORE),
    ];

    let gates: Vec<GatePayload> = checks
        .iter()
        .map(|&(name, value, threshold)| GatePayload {
            gate: name.to_string(),
            passed: value <= threshold,
            reason: format!("{name} {value:.1} vs max {threshold:.1}"),
            value,
            threshold,
        })
        .collect();

    let failed = gates.iter().any(|g| !g.passed);
    let verdict = if failed { Verdict::Block } else { Verdict::Pass };

    let enforced = match mode {
        RolloutMode::Shadow => false,
        RolloutMode::Enforce { percent } => percent >= 100 || in_rollout(intent_id, percent),
    };

    RiskGateResult { verdict, gates, enforced }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_bucket_is_deterministic_and_bounded() {
        let a = rollout_bucket("intent-123");
        let b = rollout_bucket("intent-123");
        assert_eq!(a, b);
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn shadow_mode_never_enforces() {
        let result = evaluate_risk_gate("i-1", 99.0, 99.0, 99.0, RolloutMode::Shadow);
        assert_eq!(result.verdict, Verdict::Block);
        assert!(!result.enforced);
    }

    #[test]
    fn enforce_at_100_percent_always_enforces() {
        let result = evaluate_risk_gate("i-1", 1.0, 1.0, 1.0, RolloutMode::Enforce { percent: 100 });
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.enforced);
    }

    #[test]
    fn gate_passes_exactly_at_threshold() {
        let result = evaluate_risk_gate(
            "i-1",
            MAX_RISK_SCORE,
            MAX_DAMAGE_SCORE,
            MAX_PROPAGATION_SCORE,
            RolloutMode::Shadow,
        );
        assert_eq!(result.verdict, Verdict::Pass);
    }
}
