//! Embedding model trait and the built-in hashed text encoder.

use async_trait::async_trait;
use std::collections::HashMap;
use toolgate_core::{ToolgateError, ToolgateResult};

/// Default vector dimension, matching the `all-MiniLM-L6-v2` family.
pub const DEFAULT_DIMENSION: usize = 384;

/// A text encoder producing L2-normalised vectors.
///
/// The real inference runtime lives behind this trait; the in-tree
/// [`HashedTextModel`] keeps the engine self-contained and deterministic.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier, e.g. `Xenova/all-MiniLM-L6-v2`.
    fn name(&self) -> &str;

    /// Dimension of every vector this model produces.
    fn dimension(&self) -> usize;

    /// Encode a text. The output must be L2-normalised so that dot product
    /// equals cosine similarity.
    async fn embed(&self, text: &str) -> ToolgateResult<Vec<f32>>;
}

/// Deterministic bag-of-words encoder: term frequencies hashed into a fixed
/// number of buckets, L2-normalised.
pub struct HashedTextModel {
    name: String,
    dimension: usize,
}

impl HashedTextModel {
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingModel for HashedTextModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> ToolgateResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ToolgateError::Embedding(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return Err(ToolgateError::Embedding(
                "no embeddable tokens in text".to_string(),
            ));
        }

        // Three hash positions per word for better bucket distribution.
        for (word, count) in &freq {
            let tf = count / total;
            let h1 = fnv1a(word.as_bytes()) as usize;
            let h2 = fnv1a(&[word.as_bytes(), &[1u8]].concat()) as usize;
            let h3 = fnv1a(&[word.as_bytes(), &[2u8]].concat()) as usize;

            vector[h1 % self.dimension] += tf;
            vector[h2 % self.dimension] += tf * 0.7;
            vector[h3 % self.dimension] += tf * 0.5;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

/// FNV-1a over the input bytes.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Dot product. Because both inputs are L2-normalised this is the cosine
/// similarity. Mismatched lengths score 0.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
