//! Structural degradation ("bomb") detection, ported from the reference's
//! `risk/bombs.py` — thresholds and display limits match it exactly.

use std::collections::BTreeSet;

use converge_types::{Intent, Simulation};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::graph::{self, BuiltGraph};

const CASCADE_PR_FACTOR: f64 = 1.5;
const CASCADE_MIN_FANOUT: usize = 3;
const CASCADE_BLAST_FACTOR: f64 = 1.5;
const CASCADE_DISPLAY_LIMIT: usize = 5;

const SPIRAL_MIN_CYCLE_LEN: usize = 2;
const SPIRAL_MAX_CYCLES: usize = 10;
const SPIRAL_MIN_SIGNIFICANT: usize = 2;
const CYCLE_DISPLAY_LIMIT: usize = 3;
const CYCLE_NODE_LIMIT: usize = 5;

const THERMAL_FILES_HOT: usize = 10;
const THERMAL_DEPS_HOT: usize = 3;
const THERMAL_COMPONENTS_HOT: usize = 3;
const THERMAL_EDGE_DENSITY_FACTOR: usize = 2;
const THERMAL_MIN_INDICATORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BombSeverity {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub kind: String,
    pub severity: BombSeverity,
    pub message: String,
}

pub fn detect_bombs(intent: &Intent, simulation: &Simulation, built: &BuiltGraph) -> Vec<Bomb> {
    let mut bombs = Vec::new();
    if built.graph.node_count() == 0 {
        return bombs;
    }

    let pr = graph::pagerank(&built.graph, 0.85, 100, 1e-6);
    detect_cascade(simulation, built, &pr, &mut bombs);
    detect_spiral(built, &mut bombs);
    detect_thermal_death(intent, simulation, built, &mut bombs);
    bombs
}

fn detect_cascade(
    simulation: &Simulation,
    built: &BuiltGraph,
    pr: &std::collections::BTreeMap<NodeIndex, f64>,
    out: &mut Vec<Bomb>,
) {
    let total_nodes = built.graph.node_count().max(1) as f64;
    let threshold = CASCADE_PR_FACTOR / total_nodes;

    let high_pr: Vec<NodeIndex> =
        built.file_nodes.iter().copied().filter(|n| pr.get(n).copied().unwrap_or(0.0) > threshold).collect();
    let high_fanout: Vec<NodeIndex> =
        high_pr.into_iter().filter(|&n| built.graph.edges(n).count() >= CASCADE_MIN_FANOUT).collect();

    if high_fanout.is_empty() {
        return;
    }

    let mut affected: BTreeSet<NodeIndex> = BTreeSet::new();
    for &n in &high_fanout {
        affected.extend(graph::descendants_of(&built.graph, n));
    }

    if affected.len() as f64 > simulation.files_changed.len() as f64 * CASCADE_BLAST_FACTOR {
        let labels: Vec<&str> = high_fanout
            .iter()
            .take(CASCADE_DISPLAY_LIMIT)
            .map(|&n| built.graph[n].label.as_str())
            .collect();
        out.push(Bomb {
            kind: "cascade".to_string(),
            severity: BombSeverity::High,
            message: format!(
                "change touches {} high-centrality node(s) with potential cascade to {} nodes ({})",
                high_fanout.len(),
                affected.len(),
                labels.join(", ")
            ),
        });
    }
}

fn detect_spiral(built: &BuiltGraph, out: &mut Vec<Bomb>) {
    let cycles = graph::enumerate_cycles(&built.graph, SPIRAL_MAX_CYCLES);
    let significant: Vec<&Vec<NodeIndex>> = cycles.iter().filter(|c| c.len() >= SPIRAL_MIN_CYCLE_LEN).collect();

    if significant.len() >= SPIRAL_MIN_SIGNIFICANT {
        let shown: Vec<String> = significant
            .iter()
            .take(CYCLE_DISPLAY_LIMIT)
            .map(|cycle| {
                cycle
                    .iter()
                    .take(CYCLE_NODE_LIMIT)
                    .map(|&n| built.graph[n].label.clone())
                    .collect::<Vec<_>>()
                    .join(" -> ")
            })
            .collect();
        out.push(Bomb {
            kind: "spiral".to_string(),
            severity: BombSeverity::Medium,
            message: format!("{} circular dependency cycle(s) detected: [{}]", significant.len(), shown.join("; ")),
        });
    }
}

fn detect_thermal_death(intent: &Intent, simulation: &Simulation, built: &BuiltGraph, out: &mut Vec<Bomb>) {
    let files_count = simulation.files_changed.len();
    let conflict_count = simulation.conflicts.len();
    let deps_count = intent.dependencies.len();
    let components = graph::weakly_connected_components(&built.graph);
    let nodes = built.graph.node_count();
    let edges = built.graph.edge_count();

    let hot_indicators = [
        files_count > THERMAL_FILES_HOT,
        conflict_count > 0,
        deps_count > THERMAL_DEPS_HOT,
        components > THERMAL_COMPONENTS_HOT,
        edges > nodes * THERMAL_EDGE_DENSITY_FACTOR,
    ]
    .iter()
    .filter(|&&v| v)
    .count();

    if hot_indicators >= THERMAL_MIN_INDICATORS {
        out.push(Bomb {
            kind: "thermal_death".to_string(),
            severity: BombSeverity::Critical,
            message: format!(
                "{hot_indicators}/5 entropy indicators elevated: files={files_count}, conflicts={conflict_count}, \
                 deps={deps_count}, components={components}, edge_density={edges}/{nodes}"
            ),
        });
    }
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
    fn no_bombs_for_a_trivial_change() {
        let intent = Intent::new("i-1", "feature/x", "main");
        let simulation = sim(&["a.py"], &[]);
        let built = build_dependency_graph(&intent, &simulation);
        assert!(detect_bombs(&intent, &simulation, &built).is_empty());
    }

    #[test]
    fn thermal_death_triggers_on_many_simultaneous_indicators() {
        let mut intent = Intent::new("i-1", "feature/x", "main");
        intent.dependencies = vec!["d1".into(), "d2".into(), "d3".into(), "d4".into()];
        let files: Vec<String> = (0..15).map(|i| format!("dir{i}/f{i}.py")).collect();
        let conflicts = vec!["dir0/f0.py".to_string()];
        let simulation = Simulation {
            mergeable: false,
            conflicts,
            files_changed: files,
            source: "feature/x".to_string(),
            target: "main".to_string(),
            timestamp: converge_types::now(),
        };
        let built = build_dependency_graph(&intent, &simulation);
        let bombs = detect_bombs(&intent, &simulation, &built);
        assert!(bombs.iter().any(|b| b.kind == "thermal_death"));
    }
}
