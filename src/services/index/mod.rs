//! Nearest-neighbour index over course embeddings
//!
//! Exact (brute force) cosine search. The catalog is a few thousand rows, so
//! a linear scan per query is cheaper than maintaining an ANN structure; the
//! expensive part is producing the vectors, which is why the index can be
//! persisted and restored.

use std::cmp::Ordering;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::CourseMetadata,
    services::{catalog::Catalog, embeddings::{validate_vector, validate_vectors, EmbeddingProvider}},
};

pub mod document;
pub mod store;

pub use document::{render_document, EmbeddedDocument};
pub use store::{FileIndexStore, IndexStore, RedisIndexStore};

/// How the in-memory index came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    Built,
    Restored,
}

/// A search result: the stored course attributes and their distance to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub metadata: &'a CourseMetadata,
    /// Cosine distance, `1 - cos(query, document)`; 0 is identical
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct EmbeddingIndex {
    model: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    source: IndexSource,
    documents: Vec<EmbeddedDocument>,
}

impl EmbeddingIndex {
    /// Embeds every catalog record and indexes the result
    ///
    /// All or nothing: if the provider fails or returns unusable vectors, no
    /// index is produced.
    pub async fn build(catalog: &Catalog, provider: &dyn EmbeddingProvider) -> AppResult<Self> {
        let start = Instant::now();
        let model = provider.model();

        let texts: Vec<String> = catalog.records().iter().map(render_document).collect();

        tracing::info!(
            documents = texts.len(),
            model = %model,
            "Embedding catalog documents"
        );

        let vectors = provider.embed_many(&texts).await?;
        let dimension = validate_vectors(texts.len(), &vectors)?;

        let documents = catalog
            .records()
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((record, text), vector)| EmbeddedDocument {
                text,
                metadata: CourseMetadata::from(record),
                vector,
            })
            .collect();

        let index = Self {
            model,
            dimension,
            built_at: Utc::now(),
            source: IndexSource::Built,
            documents,
        };

        tracing::info!(
            documents = index.len(),
            dimension,
            duration_ms = start.elapsed().as_millis(),
            "Embedding index built"
        );

        Ok(index)
    }

    pub(crate) fn from_parts(
        model: String,
        dimension: usize,
        built_at: DateTime<Utc>,
        source: IndexSource,
        documents: Vec<EmbeddedDocument>,
    ) -> Self {
        Self {
            model,
            dimension,
            built_at,
            source,
            documents,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn source(&self) -> IndexSource {
        self.source
    }

    pub fn documents(&self) -> &[EmbeddedDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Embeds `query` and returns the `k` closest documents, closest first
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> AppResult<Vec<SearchHit<'_>>> {
        if k == 0 {
            return Err(AppError::InvalidInput(
                "number of results must be at least 1".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = provider.embed(query).await?;
        validate_vector(&query_vector)?;
        self.search_vector(&query_vector, k)
    }

    /// Returns the `k` documents closest to `query_vector`, closest first
    ///
    /// Equal distances keep catalog order.
    pub fn search_vector(&self, query_vector: &[f32], k: usize) -> AppResult<Vec<SearchHit<'_>>> {
        if k == 0 {
            return Err(AppError::InvalidInput(
                "number of results must be at least 1".to_string(),
            ));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimension {
            return Err(AppError::EmbeddingProvider(format!(
                "query vector has {} dimensions, index has {}",
                query_vector.len(),
                self.dimension
            )));
        }

        let query_norm = norm(query_vector);
        let mut hits: Vec<SearchHit<'_>> = self
            .documents
            .iter()
            .map(|doc| SearchHit {
                metadata: &doc.metadata,
                distance: cosine_distance(query_vector, query_norm, &doc.vector),
            })
            .collect();

        // sort_by is stable, which gives the catalog-order tie-break
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Zero vectors are treated as orthogonal to everything
fn cosine_distance(query: &[f32], query_norm: f32, doc: &[f32]) -> f32 {
    let doc_norm = norm(doc);
    if query_norm == 0.0 || doc_norm == 0.0 {
        return 1.0;
    }
    let dot: f32 = query.iter().zip(doc).map(|(a, b)| a * b).sum();
    (1.0 - dot / (query_norm * doc_norm)).clamp(0.0, 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourseRecord;
    use crate::services::embeddings::{HashEmbeddings, MockEmbeddingProvider};

    fn catalog() -> Catalog {
        let courses = [
            ("1", "Computer Science", "Canada"),
            ("2", "Fine Arts", "Italy"),
            ("3", "Law", "Ireland"),
        ];
        Catalog::from_records(
            courses
                .iter()
                .map(|(id, program, country)| {
                    let mut record = CourseRecord::new(*id);
                    record.parent_course = Some(program.to_string());
                    record.course_name = Some(program.to_string());
                    record.country = Some(country.to_string());
                    record
                })
                .collect(),
        )
    }

    fn fixed_index(vectors: Vec<Vec<f32>>) -> EmbeddingIndex {
        let documents = vectors
            .into_iter()
            .enumerate()
            .map(|(i, vector)| EmbeddedDocument {
                text: format!("doc {i}"),
                metadata: CourseMetadata::from(&CourseRecord::new(i.to_string())),
                vector,
            })
            .collect();
        EmbeddingIndex::from_parts("test".to_string(), 2, Utc::now(), IndexSource::Built, documents)
    }

    #[tokio::test]
    async fn test_build_indexes_every_record() {
        let catalog = catalog();
        let index = EmbeddingIndex::build(&catalog, &HashEmbeddings::new(64))
            .await
            .unwrap();

        assert_eq!(index.len(), catalog.len());
        assert_eq!(index.dimension(), 64);
        assert_eq!(index.model(), "hash-fnv1a-64");
        assert_eq!(index.source(), IndexSource::Built);
        assert_eq!(index.documents()[0].metadata.course_id, "1");
        assert!(index.documents()[0].text.contains("Parent Course: Computer Science"));
    }

    #[tokio::test]
    async fn test_build_fails_when_provider_fails() {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_model().returning(|| "mock".to_string());
        provider
            .expect_embed_many()
            .returning(|_| Err(AppError::EmbeddingProvider("unauthorized".to_string())));

        let result = EmbeddingIndex::build(&catalog(), &provider).await;
        assert!(matches!(result, Err(AppError::EmbeddingProvider(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_short_vector_batch() {
        let mut provider = MockEmbeddingProvider::new();
        provider.expect_model().returning(|| "mock".to_string());
        provider
            .expect_embed_many()
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));

        let result = EmbeddingIndex::build(&catalog(), &provider).await;
        assert!(matches!(result, Err(AppError::EmbeddingProvider(_))));
    }

    #[tokio::test]
    async fn test_search_returns_closest_first() {
        let catalog = catalog();
        let embedder = HashEmbeddings::default();
        let index = EmbeddingIndex::build(&catalog, &embedder).await.unwrap();

        let hits = index
            .search(&embedder, "Program: Computer Science Countries: Canada", 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.course_id, "1");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_vector_distances_and_ties() {
        let index = fixed_index(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![-1.0, 0.0],
        ]);

        let hits = index.search_vector(&[1.0, 0.0], 4).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.metadata.course_id.as_str()).collect();

        // 1 and 2 are both identical in direction; catalog order breaks the tie
        assert_eq!(ids, vec!["1", "2", "0", "3"]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!((hits[2].distance - 1.0).abs() < 1e-6);
        assert!((hits[3].distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_vector_truncates_and_validates() {
        let index = fixed_index(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);

        assert_eq!(index.search_vector(&[1.0, 0.0], 1).unwrap().len(), 1);
        assert_eq!(index.search_vector(&[1.0, 0.0], 10).unwrap().len(), 2);
        assert!(matches!(
            index.search_vector(&[1.0, 0.0], 0),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            index.search_vector(&[1.0, 0.0, 0.0], 1),
            Err(AppError::EmbeddingProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_search_empty_index_skips_provider() {
        // No expectations: any provider call would panic
        let provider = MockEmbeddingProvider::new();
        let index = fixed_index(Vec::new());

        let hits = index.search(&provider, "Program: Law", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_zero_query_vector_is_orthogonal() {
        let index = fixed_index(vec![vec![0.0, 1.0]]);
        let hits = index.search_vector(&[0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].distance, 1.0);
    }
}
