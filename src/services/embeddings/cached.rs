//! Query embedding cache
//!
//! Wraps another provider and keeps query vectors in Redis. Identical
//! preference forms are common (UI pickers), so repeat searches skip the
//! provider round trip. Document embeddings are not cached here; the
//! persisted index already covers them.

use std::sync::Arc;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::AppResult,
    services::embeddings::{validate_vector, EmbeddingProvider},
};

#[derive(Clone)]
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingProvider>,
    cache: Cache,
    ttl: u64,
}

impl CachedEmbeddings {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, cache: Cache, ttl: u64) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CachedEmbeddings {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let key = CacheKey::QueryEmbedding {
            model: self.inner.model(),
            query: text.to_string(),
        };

        let vector: AppResult<Vec<f32>> = cached!(self.cache, key, self.ttl, async move {
            self.inner.embed(text).await
        });
        let vector = vector?;

        validate_vector(&vector)?;
        Ok(vector)
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.inner.embed_many(texts).await
    }

    fn model(&self) -> String {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_redis_client;
    use crate::error::AppError;
    use crate::services::embeddings::MockEmbeddingProvider;

    #[tokio::test]
    async fn test_falls_through_to_provider_when_cache_is_down() {
        let mut inner = MockEmbeddingProvider::new();
        inner
            .expect_model()
            .returning(|| "models/embedding-001".to_string());
        inner
            .expect_embed()
            .times(1)
            .returning(|_| Ok(vec![0.6, 0.8]));

        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);
        let provider = CachedEmbeddings::new(Arc::new(inner), cache, 60);

        let vector = provider.embed("Program: Law").await.unwrap();
        assert_eq!(vector, vec![0.6, 0.8]);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_provider_errors_propagate() {
        let mut inner = MockEmbeddingProvider::new();
        inner.expect_model().returning(|| "m".to_string());
        inner
            .expect_embed()
            .returning(|_| Err(AppError::EmbeddingProvider("unauthorized".to_string())));

        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);
        let provider = CachedEmbeddings::new(Arc::new(inner), cache, 60);

        let result = provider.embed("Program: Law").await;
        assert!(matches!(result, Err(AppError::EmbeddingProvider(_))));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_documents_bypass_cache() {
        let mut inner = MockEmbeddingProvider::new();
        inner
            .expect_embed_many()
            .times(1)
            .returning(|texts| Ok(texts.iter().map(|_| vec![1.0]).collect()));

        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);
        let provider = CachedEmbeddings::new(Arc::new(inner), cache, 60);

        let vectors = provider
            .embed_many(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);

        handle.shutdown().await;
    }
}
