//! SLO/KPI compliance evaluation, ported from `projections/compliance.py`.
//! Pure over caller-supplied aggregates — the caller queries the event log
//! and store for tenant thresholds, this just runs the five checks.

use converge_types::ComplianceThresholds;

use crate::models::{ComplianceCheck, ComplianceReport};

pub struct ComplianceInputs {
    pub total_simulations: u64,
    pub mergeable_simulations: u64,
    pub retries_total: u64,
    pub queue_tracked: u64,
    pub debt_score: f64,
}

fn check(name: &str, value: f64, op: &str, threshold: f64) -> ComplianceCheck {
    let passed = if op == ">=" { value >= threshold } else { value <= threshold };
    ComplianceCheck { name: name.to_string(), value, threshold, op: op.to_string(), passed }
}

pub fn compliance_report(inputs: &ComplianceInputs, thresholds: &ComplianceThresholds, tenant_id: Option<String>) -> ComplianceReport {
    let mergeable_rate =
        if inputs.total_simulations > 0 { inputs.mergeable_simulations as f64 / inputs.total_simulations as f64 } else { 1.0 };
    let conflict_rate = 1.0 - mergeable_rate;
    let mergeable_rate = round3(mergeable_rate);
    let conflict_rate = round3(conflict_rate);

    let checks = vec![
        check("mergeable_rate", mergeable_rate, ">=", thresholds.min_mergeable_rate),
        check("conflict_rate", conflict_rate, "<=", thresholds.max_conflict_rate),
        check("retries_total", inputs.retries_total as f64, "<=", thresholds.max_retries_total as f64),
        check("queue_tracked", inputs.queue_tracked as f64, "<=", thresholds.max_queue_tracked as f64),
        check("debt_score", inputs.debt_score, "<=", thresholds.max_debt_score),
    ];

    let alerts: Vec<ComplianceCheck> = checks.iter().filter(|c| !c.passed).cloned().collect();
    let passed = alerts.is_empty();

    ComplianceReport {
        mergeable_rate,
        conflict_rate,
        retries_total: inputs.retries_total,
        queue_tracked: inputs.queue_tracked,
        checks,
        passed,
        alerts,
        tenant_id,
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_when_all_checks_are_within_threshold() {
        let inputs = ComplianceInputs { total_simulations: 10, mergeable_simulations: 9, retries_total: 5, queue_tracked: 20, debt_score: 10.0 };
        let report = compliance_report(&inputs, &ComplianceThresholds::default(), None);
        assert!(report.passed);
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn flags_mergeable_rate_breach() {
        let inputs = ComplianceInputs { total_simulations: 10, mergeable_simulations: 2, retries_total: 0, queue_tracked: 0, debt_score: 0.0 };
        let report = compliance_report(&inputs, &ComplianceThresholds::default(), None);
        assert!(!report.passed);
        assert!(report.alerts.iter().any(|c| c.name == "mergeable_rate"));
    }

    #[test]
    fn zero_simulations_defaults_to_fully_mergeable() {
        let inputs = ComplianceInputs { total_simulations: 0, mergeable_simulations: 0, retries_total: 0, queue_tracked: 0, debt_score: 0.0 };
        let report = compliance_report(&inputs, &ComplianceThresholds::default(), None);
        assert_eq!(report.mergeable_rate, 1.0);
    }
}
