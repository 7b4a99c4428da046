//! Issue prediction from recent trends and structural-degradation (bomb)
//! signals, ported from `projections/predictions.py`.

use crate::models::PredictionSignal;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimSample {
    pub mergeable: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskSample {
    pub entropy_score: f64,
    pub propagation_score: f64,
    pub containment_score: f64,
}

#[derive(Debug, Default)]
pub struct PredictionInputs {
    /// Simulations completed in the last 24h.
    pub sims_24h: Vec<SimSample>,
    /// Simulations completed in the preceding 24-48h window.
    pub sims_prev_24h: Vec<SimSample>,
    /// Risk evaluations in the last 24h.
    pub risk_24h: Vec<RiskSample>,
    /// Risk evaluations in the preceding 24-48h window.
    pub risk_prev_24h: Vec<RiskSample>,
    pub requeued_24h: u64,
    pub rejected_24h: u64,
    pub merged_24h: u64,
}

fn conflict_rate(sims: &[SimSample]) -> f64 {
    if sims.is_empty() {
        return 0.0;
    }
    sims.iter().filter(|s| !s.mergeable).count() as f64 / sims.len() as f64
}

fn avg_entropy(risk: &[RiskSample]) -> f64 {
    if risk.is_empty() {
        return 0.0;
    }
    risk.iter().map(|r| r.entropy_score).sum::<f64>() / risk.len() as f64
}

fn avg_containment(risk: &[RiskSample]) -> f64 {
    if risk.is_empty() {
        return 0.0;
    }
    risk.iter().map(|r| r.containment_score).sum::<f64>() / risk.len() as f64
}

fn avg_propagation(risk: &[RiskSample]) -> f64 {
    if risk.is_empty() {
        return 0.0;
    }
    risk.iter().map(|r| r.propagation_score).sum::<f64>() / risk.len() as f64
}

fn signal(signal: &str, severity: &str, message: String, recommendation: &str) -> PredictionSignal {
    PredictionSignal {
        signal: signal.to_string(),
        severity: severity.to_string(),
        message,
        recommendation: recommendation.to_string(),
    }
}

pub fn predict_issues(inputs: &PredictionInputs) -> Vec<PredictionSignal> {
    let mut signals = Vec::new();

    let conflict_rate_now = conflict_rate(&inputs.sims_24h);
    let conflict_rate_prev = conflict_rate(&inputs.sims_prev_24h);
    if conflict_rate_now > conflict_rate_prev + 0.1 && inputs.sims_24h.len() > 3 {
        signals.push(signal(
            "rising_conflict_rate",
            "high",
            format!(
                "Conflict rate rose from {:.0}% to {:.0}% in last 24h",
                conflict_rate_prev * 100.0,
                conflict_rate_now * 100.0
            ),
            "Consider pausing new intents and resolving current conflicts",
        ));
    }

    let avg_entropy_now = avg_entropy(&inputs.risk_24h);
    let avg_entropy_prev = avg_entropy(&inputs.risk_prev_24h);
    if avg_entropy_now > avg_entropy_prev * 1.2 && avg_entropy_now > 15.0 && inputs.risk_24h.len() > 3 {
        signals.push(signal(
            "entropy_spike",
            "medium",
            format!("Average entropy rose from {:.1} to {:.1}", avg_entropy_prev, avg_entropy_now),
            "Review recent intents for large or high-risk changes",
        ));
    }

    if inputs.requeued_24h > 5 {
        signals.push(signal(
            "queue_stalling",
            "high",
            format!("{} intents requeued in last 24h", inputs.requeued_24h),
            "Check for systemic merge conflicts or failing checks",
        ));
    }

    let total_decisions = inputs.rejected_24h + inputs.merged_24h;
    if total_decisions > 3 && inputs.rejected_24h as f64 / total_decisions as f64 > 0.4 {
        signals.push(signal(
            "high_rejection_rate",
            "critical",
            format!(
                "{}/{} intents rejected in last 24h ({:.0}%)",
                inputs.rejected_24h,
                total_decisions,
                inputs.rejected_24h as f64 / total_decisions as f64 * 100.0
            ),
            "Review policy thresholds or source branch quality",
        ));
    }

    if !inputs.risk_24h.is_empty() {
        let high_prop = inputs.risk_24h.iter().filter(|r| r.propagation_score > 40.0).count();
        if high_prop >= 3 {
            signals.push(signal(
                "bomb.cascade",
                "high",
                format!(
                    "{}/{} recent changes have high propagation scores (>40)",
                    high_prop,
                    inputs.risk_24h.len()
                ),
                "Multiple high-blast-radius changes detected — risk of cascade failures",
            ));
        }
    }

    if inputs.risk_24h.len() >= 3 && inputs.risk_prev_24h.len() >= 3 {
        let avg_cont_now = avg_containment(&inputs.risk_24h);
        let avg_cont_prev = avg_containment(&inputs.risk_prev_24h);
        if avg_cont_now < avg_cont_prev - 0.1 && avg_cont_now < 0.6 {
            signals.push(signal(
                "bomb.spiral",
                "medium",
                format!(
                    "Containment dropping from {:.2} to {:.2} — changes becoming less isolated",
                    avg_cont_prev, avg_cont_now
                ),
                "Increasing cross-boundary coupling detected — enforce scope limits",
            ));
        }
    }

    if !inputs.risk_24h.is_empty() && !inputs.sims_24h.is_empty() {
        let all_hot =
            avg_entropy_now > 20.0 && conflict_rate_now > 0.2 && avg_propagation(&inputs.risk_24h) > 30.0;
        if all_hot {
            signals.push(signal(
                "bomb.thermal_death",
                "critical",
                format!(
                    "System under thermal stress: entropy={:.1}, conflict_rate={:.0}%, propagation elevated",
                    avg_entropy_now,
                    conflict_rate_now * 100.0
                ),
                "Halt new intents — system entropy is approaching critical levels",
            ));
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_yield_no_signals() {
        let inputs = PredictionInputs::default();
        assert!(predict_issues(&inputs).is_empty());
    }

    #[test]
    fn detects_rising_conflict_rate() {
        let inputs = PredictionInputs {
            sims_24h: vec![SimSample { mergeable: false }; 8],
            sims_prev_24h: vec![SimSample { mergeable: true }; 8],
            ..Default::default()
        };
        let signals = predict_issues(&inputs);
        assert!(signals.iter().any(|s| s.signal == "rising_conflict_rate"));
    }

    #[test]
    fn detects_cascade_bomb() {
        let inputs = PredictionInputs {
            risk_24h: vec![RiskSample { propagation_score: 50.0, ..Default::default() }; 4],
            ..Default::default()
        };
        let signals = predict_issues(&inputs);
        assert!(signals.iter().any(|s| s.signal == "bomb.cascade"));
    }

    #[test]
    fn detects_high_rejection_rate() {
        let inputs = PredictionInputs { rejected_24h: 5, merged_24h: 2, ..Default::default() };
        let signals = predict_issues(&inputs);
        assert!(signals.iter().any(|s| s.signal == "high_rejection_rate"));
    }
}
