//! Embedding provider abstraction
//!
//! The index and the ranker only talk to `EmbeddingProvider`; which backend
//! produces the vectors (Gemini over HTTP, the offline hash embedder, or a
//! cached wrapper around either) is decided once at startup.

use crate::error::{AppError, AppResult};

pub mod cached;
pub mod gemini;
pub mod hash;

pub use cached::CachedEmbeddings;
pub use gemini::GeminiEmbeddings;
pub use hash::HashEmbeddings;

/// Trait for text embedding backends
///
/// Implementations must be deterministic for a given model: the same text
/// always maps to the same vector, otherwise a persisted index goes stale.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a search query
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;

    /// Embed catalog documents, returning one vector per text in input order
    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Identifies the vector space; vectors from different models never mix
    fn model(&self) -> String;
}

/// Checks a batch of vectors returned by a provider
///
/// Returns the common dimension. Fails when the count differs from what was
/// requested, or when any vector is empty, has a different length than the
/// first, or contains a non-finite value.
pub fn validate_vectors(expected: usize, vectors: &[Vec<f32>]) -> AppResult<usize> {
    if vectors.len() != expected {
        return Err(AppError::EmbeddingProvider(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let dimension = first.len();

    for (i, vector) in vectors.iter().enumerate() {
        validate_vector(vector).map_err(|e| match e {
            AppError::EmbeddingProvider(msg) => {
                AppError::EmbeddingProvider(format!("vector {}: {}", i, msg))
            }
            other => other,
        })?;
        if vector.len() != dimension {
            return Err(AppError::EmbeddingProvider(format!(
                "vector {} has {} dimensions, expected {}",
                i,
                vector.len(),
                dimension
            )));
        }
    }

    Ok(dimension)
}

/// Checks a single vector returned by a provider
pub fn validate_vector(vector: &[f32]) -> AppResult<()> {
    if vector.is_empty() {
        return Err(AppError::EmbeddingProvider("empty vector".to_string()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(AppError::EmbeddingProvider(
            "vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}
