//! Per-risk-level gate profiles: entropy budget, containment floor, blast
//! radius limit, and required checks (`lint` for low/medium, `lint` +
//! `unit_tests` once the tier reaches high/critical), one profile per
//! `RiskLevel`.

use converge_types::RiskLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub entropy_budget: f64,
    pub containment_min: f64,
    pub blast_limit: f64,
    pub checks: Vec<String>,
    pub coherence_pass: f64,
    pub coherence_warn: f64,
}

pub fn default_profile(level: RiskLevel) -> Profile {
    match level {
        RiskLevel::Low => Profile {
            entropy_budget: 40.0,
            containment_min: 0.50,
            blast_limit: 40.0,
            checks: vec!["lint".to_string()],
            coherence_pass: 0.75,
            coherence_warn: 0.60,
        },
        RiskLevel::Medium => Profile {
            entropy_budget: 30.0,
            containment_min: 0.60,
            blast_limit: 50.0,
            checks: vec!["lint".to_string()],
            coherence_pass: 0.80,
            coherence_warn: 0.65,
        },
        RiskLevel::High => Profile {
            entropy_budget: 20.0,
            containment_min: 0.70,
            blast_limit: 65.0,
            checks: vec!["lint".to_string(), "unit_tests".to_string()],
            coherence_pass: 0.85,
            coherence_warn: 0.70,
        },
        RiskLevel::Critical => Profile {
            entropy_budget: 10.0,
            containment_min: 0.85,
            blast_limit: 80.0,
            checks: vec!["lint".to_string(), "unit_tests".to_string()],
            coherence_pass: 0.90,
            coherence_warn: 0.75,
        },
    }
}
