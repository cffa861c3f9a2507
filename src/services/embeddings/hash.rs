//! Offline hash embeddings
//!
//! FNV-1a feature hashing over lowercase unigrams and bigrams, L2 normalized.
//! No network, no model files, fully deterministic. Used for local
//! development and tests; similarity is lexical rather than semantic.

use crate::{error::AppResult, services::embeddings::EmbeddingProvider};

#[derive(Debug, Clone)]
pub struct HashEmbeddings {
    dims: usize,
}

impl Default for HashEmbeddings {
    fn default() -> Self {
        Self { dims: 384 }
    }
}

impl HashEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Embeds text synchronously
    ///
    /// Text without any token of two or more characters yields the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dims];
        if self.dims == 0 {
            return embedding;
        }

        let tokens = tokenize(text);
        for token in &tokens {
            accumulate(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            accumulate(&mut embedding, &format!("{} {}", window[0], window[1]), 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbeddings {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn model(&self) -> String {
        format!("hash-fnv1a-{}", self.dims)
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn accumulate(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a(token.as_bytes());
    let len = embedding.len();

    // A handful of signed buckets per token keeps collisions tolerable
    for salt in 0..4u64 {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&token_hash.to_le_bytes());
        bytes[8..].copy_from_slice(&salt.to_le_bytes());
        let h = fnv1a(&bytes);

        let sign = if h & 1 == 0 { weight } else { -weight };
        embedding[((h >> 1) as usize) % len] += sign;
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter_mut().for_each(|v| *v /= norm);
    }
}
