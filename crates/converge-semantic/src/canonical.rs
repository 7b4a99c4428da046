//! Deterministic canonical text builder, ported from `semantic/canonical.py`.
//! Same input always produces the same output (and checksum). Sections are
//! emitted in fixed order; within a section, keys/entries are sorted.

use converge_types::Intent;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default)]
pub struct CommitLink {
    pub sha: String,
    pub role: String,
}

#[derive(Debug, Clone, Default)]
pub struct CouplingEntry {
    pub file_a: String,
    pub file_b: String,
    pub co_changes: u64,
}

/// Builds the canonical text for `intent` and its surrounding context.
/// Missing or empty fields produce empty sections (omitted from output).
pub fn build_canonical_text(intent: &Intent, commit_links: &[CommitLink], coupling: &[CouplingEntry]) -> String {
    let mut parts: Vec<String> = Vec::new();

    // Section 1: identity
    parts.push(format!("intent:{}", intent.id));
    parts.push(format!("source:{}", intent.source));
    parts.push(format!("target:{}", intent.target));
    parts.push(format!("risk:{}", intent.risk_level));
    if let Some(plan_id) = &intent.plan_id {
        parts.push(format!("plan:{plan_id}"));
    }

    // Section 2: semantic metadata, fixed field order (problem, objective,
    // description) stands in for the reference's sorted dict-key iteration
    // since this implementation types the fields instead of using a dict.
    if let Some(v) = &intent.semantic.problem {
        if !v.is_empty() {
            parts.push(format!("semantic.problem:{v}"));
        }
    }
    if let Some(v) = &intent.semantic.objective {
        if !v.is_empty() {
            parts.push(format!("semantic.objective:{v}"));
        }
    }
    if let Some(v) = &intent.semantic.description {
        if !v.is_empty() {
            parts.push(format!("semantic.description:{v}"));
        }
    }

    // Section 3: scope hints (sorted)
    if let Some(scope) = &intent.technical.scope_hints {
        let mut sorted: Vec<&String> = scope.iter().collect();
        sorted.sort();
        for s in sorted {
            parts.push(format!("scope:{s}"));
        }
    }

    // Section 4: dependencies (sorted)
    if !intent.dependencies.is_empty() {
        let mut deps: Vec<&String> = intent.dependencies.iter().collect();
        deps.sort();
        for dep in deps {
            parts.push(format!("dep:{dep}"));
        }
    }

    // Section 5: commit links (sorted by sha+role)
    if !commit_links.is_empty() {
        let mut links: Vec<&CommitLink> = commit_links.iter().collect();
        links.sort_by(|a, b| (&a.sha, &a.role).cmp(&(&b.sha, &b.role)));
        for link in links {
            parts.push(format!("link:{}:{}", link.sha, link.role));
        }
    }

    // Section 6: coupling context (sorted by file pair)
    if !coupling.is_empty() {
        let mut entries: Vec<&CouplingEntry> = coupling.iter().collect();
        entries.sort_by(|a, b| (&a.file_a, &a.file_b).cmp(&(&b.file_a, &b.file_b)));
        for c in entries {
            parts.push(format!("coupling:{}:{}:{}", c.file_a, c.file_b, c.co_changes));
        }
    }

    parts.join("\n")
}

/// SHA-256 hex digest of the canonical text.
pub fn canonical_checksum(canonical_text: &str) -> String {
    hex::encode(Sha256::digest(canonical_text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> Intent {
        Intent::new("i-1", "feature/x", "main")
    }

    #[test]
    fn identical_intents_yield_identical_checksums() {
        let a = build_canonical_text(&intent(), &[], &[]);
        let b = build_canonical_text(&intent(), &[], &[]);
        assert_eq!(canonical_checksum(&a), canonical_checksum(&b));
    }

    #[test]
    fn dependencies_are_sorted_regardless_of_input_order() {
        let mut i1 = intent();
        i1.dependencies = vec!["z".to_string(), "a".to_string()];
        let mut i2 = intent();
        i2.dependencies = vec!["a".to_string(), "z".to_string()];
        assert_eq!(build_canonical_text(&i1, &[], &[]), build_canonical_text(&i2, &[], &[]));
    }

    #[test]
    fn plan_id_is_omitted_when_absent() {
        let text = build_canonical_text(&intent(), &[], &[]);
        assert!(!text.contains("plan:"));
    }
}
