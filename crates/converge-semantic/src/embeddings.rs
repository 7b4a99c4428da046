//! Pluggable embedding provider, ported from `semantic/embeddings.py`.
//! `DeterministicProvider` uses SHA-256 expansion so identical text always
//! yields an identical unit-norm vector — no ML dependency, suitable for
//! exact-duplicate detection in tests and CI.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const DEFAULT_DIMENSION: usize = 64;
pub const DEFAULT_MODEL: &str = "deterministic-v1";

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vector: Vec<f64>,
    pub model: String,
    pub dimension: usize,
    pub generated_at: DateTime<Utc>,
}

pub trait EmbeddingProvider {
    fn model_name(&self) -> &str;
    fn dimension(&self) -> usize;
    fn embed(&self, text: &str) -> EmbeddingResult;

    fn embed_batch(&self, texts: &[String]) -> Vec<EmbeddingResult> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

pub struct DeterministicProvider {
    dimension: usize,
}

impl DeterministicProvider {
    pub fn new(dimension: usize) -> Self {
        DeterministicProvider { dimension }
    }
}

impl Default for DeterministicProvider {
    fn default() -> Self {
        DeterministicProvider::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingProvider for DeterministicProvider {
    fn model_name(&self) -> &str {
        DEFAULT_MODEL
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> EmbeddingResult {
        let vector = hash_to_vector(text, self.dimension);
        EmbeddingResult {
            vector,
            model: DEFAULT_MODEL.to_string(),
            dimension: self.dimension,
            generated_at: converge_types::now(),
        }
    }
}

/// Expands SHA-256(`text:i`) for increasing `i` until there are enough bytes
/// to fill `dimension` big-endian u32s, maps each to `[-1, 1]`, then
/// L2-normalizes the result.
fn hash_to_vector(text: &str, dimension: usize) -> Vec<f64> {
    let mut raw = Vec::with_capacity(dimension * 4);
    let mut i = 0u64;
    while raw.len() < dimension * 4 {
        raw.extend_from_slice(&Sha256::digest(format!("{text}:{i}").as_bytes()));
        i += 1;
    }

    let mut floats: Vec<f64> = (0..dimension)
        .map(|j| {
            let bytes = &raw[j * 4..j * 4 + 4];
            let val = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            (val as f64 / u32::MAX as f64) * 2.0 - 1.0
        })
        .collect();

    let norm = floats.iter().map(|f| f * f).sum::<f64>().sqrt();
    if norm > 0.0 {
        for f in floats.iter_mut() {
            *f /= norm;
        }
    }
    floats
}
