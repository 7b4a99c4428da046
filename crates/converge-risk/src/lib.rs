//! Dependency-graph risk scoring: graph construction, four orthogonal
//! signals, composite scores, classification, and structural "bomb"
//! detection.
//!
//! Produces 4 orthogonal signals instead of a single risk score:
//! - `entropic_load`: disorder the change introduces.
//! - `contextual_value`: importance of the files being changed (PageRank).
//! - `complexity_delta`: net complexity change to the system.
//! - `path_dependence`: sensitivity to merge order.
//!
//! Bomb detection identifies structural degradation patterns: `cascade`
//! (chain reactions via high-centrality nodes), `spiral` (circular
//! dependency coupling), and `thermal_death` (multiple entropy indicators
//! elevated simultaneously).

mod bombs;
mod eval;
mod graph;
mod signals;

pub use bombs::{Bomb, BombSeverity, detect_bombs};
pub use eval::{RiskEval, analyze_findings, classify_risk_level, evaluate_risk};
pub use graph::{
    BuiltGraph, CORE_PATHS, CORE_TARGETS, GraphMetrics, NodeKind, RiskGraph, RiskNode,
    build_dependency_graph, build_impact_edges, containment_score, graph_metrics, is_core_path,
    is_core_target, pagerank, propagation_score,
};
pub use signals::{compute_complexity_delta, compute_contextual_value, compute_entropic_load, compute_path_dependence};
