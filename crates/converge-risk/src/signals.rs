//! The four orthogonal risk signals, ported directly from the reference's
//! `risk/signals.py` — weights and clamping match it exactly.

use converge_types::{Intent, RiskLevel, Simulation};

use crate::graph::{self, BuiltGraph};

fn risk_bonus(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::Low => 0.0,
        RiskLevel::Medium => 5.0,
        RiskLevel::High => 15.0,
        RiskLevel::Critical => 30.0,
    }
}

fn clamp_score(raw: f64) -> f64 {
    graph::round1(raw).min(100.0)
}

fn count_core_touches(simulation: &Simulation) -> usize {
    simulation.files_changed.iter().filter(|f| graph::is_core_path(f)).count()
}

/// Entropic load: disorder introduced by the change.
pub fn compute_entropic_load(intent: &Intent, simulation: &Simulation, built: &BuiltGraph) -> f64 {
    let files = simulation.files_changed.len();
    let conflicts = simulation.conflicts.len();
    let deps = intent.dependencies.len();
    let dir_spread = graph::unique_dirs(&simulation.files_changed);
    let components = if built.graph.node_count() > 0 { graph::weakly_connected_components(&built.graph) } else { 1 };

    let raw = files as f64 * 2.0
        + conflicts as f64 * 15.0
        + deps as f64 * 6.0
        + dir_spread as f64 * 3.0
        + (components as f64 - 1.0) * 5.0;
    clamp_score(raw)
}

/// Contextual value: importance of the touched files (PageRank-weighted).
pub fn compute_contextual_value(intent: &Intent, simulation: &Simulation, built: &BuiltGraph) -> f64 {
    let n = built.graph.node_count();
    if n == 0 {
        return 0.0;
    }
    let pr = graph::pagerank(&built.graph, 0.85, 100, 1e-6);
    let files_count = simulation.files_changed.len().max(1);
    let file_pr_sum: f64 = built.file_nodes.iter().filter_map(|i| pr.get(i).copied()).sum();
    let expected_per_file = 1.0 / n as f64;
    let importance_ratio = file_pr_sum / (expected_per_file * files_count as f64);

    let core_touches = count_core_touches(simulation);
    let core_ratio = core_touches as f64 / files_count as f64;
    let target_bonus = if graph::is_core_target(&simulation.target) { 10.0 } else { 0.0 };

    let raw = (importance_ratio * 30.0).min(60.0) + core_ratio * 20.0 + target_bonus + risk_bonus(intent.risk_level);
    clamp_score(raw)
}

/// Complexity delta: net system complexity change.
pub fn compute_complexity_delta(intent: &Intent, built: &BuiltGraph) -> f64 {
    if built.graph.node_count() == 0 {
        return 0.0;
    }
    let density = graph::density(&built.graph);
    let edge_node_ratio = built.graph.edge_count() as f64 / built.graph.node_count().max(1) as f64;
    let cross_dir = graph::cross_dir_edges(&built.graph, &built.file_nodes);
    let scope_count = intent.technical.scope_hints.as_ref().map(|v| v.len()).unwrap_or(0);

    let raw =
        density * 40.0 + (edge_node_ratio * 10.0).min(30.0) + cross_dir as f64 * 3.0 + scope_count as f64 * 5.0;
    clamp_score(raw)
}

/// Path dependence: sensitivity to merge order.
pub fn compute_path_dependence(intent: &Intent, simulation: &Simulation, built: &BuiltGraph) -> f64 {
    let conflicts = simulation.conflicts.len();
    let deps = intent.dependencies.len();
    let core_touches = count_core_touches(simulation);

    let cycle_count = graph::enumerate_cycles(&built.graph, 20).len();
    let longest = graph::longest_dag_path(&built.graph);

    let raw = conflicts as f64 * 20.0
        + core_touches as f64 * 4.0
        + deps as f64 * 8.0
        + cycle_count as f64 * 5.0
        + longest as f64 * 2.0;
    clamp_score(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_dependency_graph;

    fn sim(files: &[&str], conflicts: &[&str]) -> Simulation {
        Simulation {
            mergeable: conflicts.is_empty(),
            conflicts: conflicts.iter().map(|s| s.to_string()).collect(),
            files_changed: files.iter().map(|s| s.to_string()).collect(),
            source: "feature/x".to_string(),
            target: "main".to_string(),
            timestamp: converge_types::now(),
        }
    }

    #[test]
    fn all_signals_stay_in_range() {
        let intent = Intent::new("i-1", "feature/x", "main");
        let simulation = sim(&["src/a.py", "src/b.py", "docs/c.md"], &["src/a.py"]);
        let built = build_dependency_graph(&intent, &simulation);

        let entropic = compute_entropic_load(&intent, &simulation, &built);
        let contextual = compute_contextual_value(&intent, &simulation, &built);
        let complexity = compute_complexity_delta(&intent, &built);
        let path = compute_path_dependence(&intent, &simulation, &built);

        for v in [entropic, contextual, complexity, path] {
            assert!((0.0..=100.0).contains(&v), "signal {v} out of range");
        }
    }

    #[test]
    fn more_conflicts_raises_entropic_load() {
        let intent = Intent::new("i-1", "feature/x", "main");
        let calm = sim(&["a.py"], &[]);
        let stormy = sim(&["a.py"], &["a.py"]);
        let built_calm = build_dependency_graph(&intent, &calm);
        let built_stormy = build_dependency_graph(&intent, &stormy);
        assert!(
            compute_entropic_load(&intent, &stormy, &built_stormy)
                > compute_entropic_load(&intent, &calm, &built_calm)
        );
    }

    #[test]
    fn no_files_changed_yields_zero_complexity_delta() {
        let intent = Intent::new("i-1", "feature/x", "main");
        let simulation = sim(&[], &[]);
        let built = build_dependency_graph(&intent, &simulation);
        // a single unconnected branch node has zero density and zero edges.
        assert_eq!(compute_complexity_delta(&intent, &built), 0.0);
    }
}
