//! Gate-based policy evaluation: runs a profile's gates against a risk
//! evaluation and a set of check results, producing a pass/warn/block
//! verdict plus the per-gate breakdown (§4.6).

use converge_types::payloads::GatePayload;
use converge_risk::RiskEval;
use serde::{Deserialize, Serialize};

use crate::profiles::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Warn,
    Block,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Block => "block",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEvaluation {
    pub verdict: Verdict,
    pub gates: Vec<GatePayload>,
}

fn gate(name: &str, passed: bool, reason: impl Into<String>, value: f64, threshold: f64) -> GatePayload {
    GatePayload { gate: name.to_string(), passed, reason: reason.into(), value, threshold }
}

/// Runs every gate in `profile` against `risk` and the required checks'
/// pass/fail state. A missing required check counts as a failing gate
/// rather than being silently skipped.
pub fn evaluate(risk: &RiskEval, profile: &Profile, check_results: &[(String, bool)]) -> PolicyEvaluation {
    let mut gates = Vec::new();

    let entropy_ok = risk.entropic_load <= profile.entropy_budget;
    gates.push(gate(
        "entropy_budget",
        entropy_ok,
        format!("entropic_load {:.1} vs budget {:.1}", risk.entropic_load, profile.entropy_budget),
        risk.entropic_load,
        profile.entropy_budget,
    ));

    let containment_ok = risk.containment_score >= profile.containment_min;
    gates.push(gate(
        "containment_min",
        containment_ok,
        format!("containment {:.2} vs min {:.2}", risk.containment_score, profile.containment_min),
        risk.containment_score,
        profile.containment_min,
    ));

    let blast_ok = risk.damage_score <= profile.blast_limit;
    gates.push(gate(
        "blast_limit",
        blast_ok,
        format!("damage_score {:.1} vs limit {:.1}", risk.damage_score, profile.blast_limit),
        risk.damage_score,
        profile.blast_limit,
    ));

    for required in &profile.checks {
        let passed = check_results.iter().find(|(name, _)| name == required).map(|(_, ok)| *ok).unwrap_or(false);
        gates.push(gate(required, passed, format!("required check `{required}`"), if passed { 1.0 } else { 0.0 }, 1.0));
    }

    let coherence = coherence_score(check_results);
    let coherence_pass = coherence >= profile.coherence_pass;
    let coherence_warn = coherence >= profile.coherence_warn;
    gates.push(gate(
        "coherence",
        coherence_warn,
        format!("coherence {coherence:.2} vs pass {:.2} / warn {:.2}", profile.coherence_pass, profile.coherence_warn),
        coherence,
        profile.coherence_pass,
    ));

    let hard_failed = gates.iter().any(|g| g.gate != "coherence" && !g.passed);
    let verdict = if hard_failed {
        Verdict::Block
    } else if !coherence_pass {
        Verdict::Warn
    } else {
        Verdict::Pass
    };

    PolicyEvaluation { verdict, gates }
}

fn coherence_score(check_results: &[(String, bool)]) -> f64 {
    if check_results.is_empty() {
        return 1.0;
    }
    let passed = check_results.iter().filter(|(_, ok)| *ok).count();
    passed as f64 / check_results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::default_profile;
    use converge_risk::{RiskEval, classify_risk_level};
    use converge_types::{RiskLevel, RiskPolicy};

    fn risk_eval(entropic_load: f64, containment_score: f64, damage_score: f64) -> RiskEval {
        RiskEval {
            entropic_load,
            contextual_value: 0.0,
            complexity_delta: 0.0,
            path_dependence: 0.0,
            risk_score: 10.0,
            damage_score,
            propagation_score: 0.0,
            containment_score,
            risk_level: classify_risk_level(10.0, &RiskPolicy::default()),
            bombs: Vec::new(),
            graph_metrics: converge_risk::GraphMetrics { nodes: 0, edges: 0, density: 0.0 },
            findings: Vec::new(),
        }
    }

    #[test]
    fn passes_when_everything_is_within_budget() {
        let profile = default_profile(RiskLevel::Low);
        let risk = risk_eval(5.0, 0.9, 5.0);
        let result = evaluate(&risk, &profile, &[("lint".to_string(), true)]);
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.gates.iter().all(|g| g.passed));
    }

    #[test]
    fn blocks_when_entropy_budget_is_exceeded() {
        let profile = default_profile(RiskLevel::Low);
        let risk = risk_eval(90.0, 0.9, 5.0);
        let result = evaluate(&risk, &profile, &[("lint".to_string(), true)]);
        assert_eq!(result.verdict, Verdict::Block);
    }

    #[test]
    fn blocks_when_containment_is_below_minimum() {
        let profile = default_profile(RiskLevel::Low);
        let risk = risk_eval(5.0, 0.1, 5.0);
        let result = evaluate(&risk, &profile, &[("lint".to_string(), true)]);
        assert_eq!(result.verdict, Verdict::Block);
        assert!(result.gates.iter().any(|g| g.gate == "containment_min" && !g.passed));
    }

    #[test]
    fn blocks_when_a_required_check_is_missing() {
        let profile = default_profile(RiskLevel::High);
        let risk = risk_eval(5.0, 0.9, 5.0);
        let result = evaluate(&risk, &profile, &[("lint".to_string(), true)]);
        assert_eq!(result.verdict, Verdict::Block);
        assert!(result.gates.iter().any(|g| g.gate == "unit_tests" && !g.passed));
    }
}
