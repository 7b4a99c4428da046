//! Semantic layer: deterministic canonical-text fingerprinting, pluggable
//! embedding providers, and cosine-similarity conflict detection.

mod canonical;
mod conflicts;
mod embeddings;

pub use canonical::{CommitLink, CouplingEntry, build_canonical_text, canonical_checksum};
pub use conflicts::{CandidateInput, ConflictCandidate, DEFAULT_SIMILARITY_THRESHOLD, cosine_similarity, scan_conflicts, scope_overlap};
pub use embeddings::{DEFAULT_DIMENSION, DEFAULT_MODEL, DeterministicProvider, EmbeddingProvider, EmbeddingResult};
