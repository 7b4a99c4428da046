#![no_main]

use converge_risk::evaluate_risk;
use converge_types::{Intent, RiskPolicy, Simulation};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Carve the fuzz input into a handful of fake changed-file paths so the
    // dependency graph built from them has arbitrary shape and overlap.
    let files_changed: Vec<String> = data
        .chunks(4)
        .take(32)
        .map(|chunk| format!("src/{}.rs", hex::encode(chunk)))
        .collect();

    let mut intent = Intent::new("fuzz-intent", "feature/fuzz", "main");
    intent.technical.scope_hints = Some(files_changed.iter().take(4).cloned().collect());
    intent.dependencies = files_changed.iter().skip(4).take(4).cloned().collect();

    let simulation = Simulation {
        mergeable: data[0] % 2 == 0,
        conflicts: files_changed.iter().rev().take(2).cloned().collect(),
        files_changed,
        source: intent.source.clone(),
        target: intent.target.clone(),
        timestamp: converge_types::now(),
    };

    let risk = evaluate_risk(&intent, &simulation, &RiskPolicy::default());

    assert!(risk.risk_score.is_finite());
    assert!((0.0..=100.0).contains(&risk.risk_score), "risk_score {} out of bounds", risk.risk_score);
    assert!(risk.damage_score.is_finite() && risk.damage_score >= 0.0);
    assert!(risk.containment_score.is_finite() && (0.0..=1.0).contains(&risk.containment_score));
    assert!(risk.propagation_score.is_finite() && risk.propagation_score >= 0.0);
});
