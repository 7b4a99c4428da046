//! Conflict candidate detection: `semantic/conflicts.py` isn't present in
//! the retrieval pack, so this module is authored from spec text (cosine
//! similarity blended with scope/target overlap, threshold 0.80) while
//! staying consistent with the present `embeddings.py`/`canonical.py`
//! surface.

use serde::Serialize;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;

#[derive(Debug, Clone, Serialize)]
pub struct ConflictCandidate {
    pub intent_a: String,
    pub intent_b: String,
    pub similarity: f64,
    pub scope_overlap: f64,
    pub same_target: bool,
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Jaccard overlap of two scope-hint sets; 1.0 when both are empty (nothing
/// to disambiguate, so treat scope as fully overlapping).
pub fn scope_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let set_a: std::collections::BTreeSet<&String> = a.iter().collect();
    let set_b: std::collections::BTreeSet<&String> = b.iter().collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

pub struct CandidateInput<'a> {
    pub intent_id: &'a str,
    pub target: &'a str,
    pub scope_hints: &'a [String],
    pub embedding: &'a [f64],
}

/// Scans all pairs in `intents` for conflict candidates whose blended
/// similarity exceeds `threshold`. Blend: 60% cosine similarity, 30% scope
/// overlap, 10% bonus for sharing a merge target.
pub fn scan_conflicts(intents: &[CandidateInput<'_>], threshold: f64) -> Vec<ConflictCandidate> {
    let mut candidates = Vec::new();
    for i in 0..intents.len() {
        for j in (i + 1)..intents.len() {
            let a = &intents[i];
            let b = &intents[j];
            let cos = cosine_similarity(a.embedding, b.embedding);
            let overlap = scope_overlap(a.scope_hints, b.scope_hints);
            let same_target = a.target == b.target;
            let blended = cos * 0.6 + overlap * 0.3 + if same_target { 0.1 } else { 0.0 };
            if blended >= threshold {
                candidates.push(ConflictCandidate {
                    intent_a: a.intent_id.to_string(),
                    intent_b: b.intent_id.to_string(),
                    similarity: blended,
                    scope_overlap: overlap,
                    same_target,
                });
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_embeddings_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn orthogonal_embeddings_have_zero_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn identical_intents_are_flagged_as_conflict_candidates() {
        let embedding = vec![0.5, 0.5, 0.5, 0.5];
        let scope = vec!["auth".to_string()];
        let intents = vec![
            CandidateInput { intent_id: "i-1", target: "main", scope_hints: &scope, embedding: &embedding },
            CandidateInput { intent_id: "i-2", target: "main", scope_hints: &scope, embedding: &embedding },
        ];
        let candidates = scan_conflicts(&intents, DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_intents_are_not_flagged() {
        let scope_a = vec!["auth".to_string()];
        let scope_b = vec!["billing".to_string()];
        let intents = vec![
            CandidateInput { intent_id: "i-1", target: "main", scope_hints: &scope_a, embedding: &[1.0, 0.0] },
            CandidateInput { intent_id: "i-2", target: "dev", scope_hints: &scope_b, embedding: &[0.0, 1.0] },
        ];
        assert!(scan_conflicts(&intents, DEFAULT_SIMILARITY_THRESHOLD).is_empty());
    }
}
