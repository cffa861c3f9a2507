use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, UserPreferences},
    services::{
        catalog::Catalog,
        embeddings::EmbeddingProvider,
        index::EmbeddingIndex,
        query::build_query,
        scoring::{compose_reasoning, score},
    },
};

/// Ranks catalog courses for a set of preferences
///
/// Holds only shared read-only state; concurrent `recommend` calls need no
/// coordination.
pub struct Recommender {
    catalog: Catalog,
    index: EmbeddingIndex,
    provider: Arc<dyn EmbeddingProvider>,
    overfetch_factor: usize,
}

impl Recommender {
    pub fn new(
        catalog: Catalog,
        index: EmbeddingIndex,
        provider: Arc<dyn EmbeddingProvider>,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            catalog,
            index,
            provider,
            overfetch_factor: overfetch_factor.max(1),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Returns up to `top_k` courses, most relevant first
    ///
    /// An empty list is a successful answer. Every failure is reported as
    /// `AppError::Recommendation` wrapping the cause.
    pub async fn recommend(
        &self,
        preferences: &UserPreferences,
        top_k: usize,
    ) -> AppResult<Vec<Recommendation>> {
        self.rank(preferences, top_k)
            .await
            .map_err(AppError::recommendation)
    }

    async fn rank(
        &self,
        preferences: &UserPreferences,
        top_k: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if top_k == 0 {
            return Err(AppError::InvalidInput(
                "top_k must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let query = build_query(preferences);
        let window = top_k.saturating_mul(self.overfetch_factor);

        let hits = self
            .index
            .search(self.provider.as_ref(), &query, window)
            .await?;
        let candidates = hits.len();

        let mut ranked: Vec<Recommendation> = hits
            .into_iter()
            .map(|hit| {
                let outcome = score(hit.metadata, preferences);
                let distance = f64::from(hit.distance);
                Recommendation {
                    course: hit.metadata.clone(),
                    similarity_score: distance,
                    match_percentage: outcome.percentage,
                    relevance_score: blend(outcome.percentage, distance),
                    reasoning: compose_reasoning(&outcome),
                    match_reasons: outcome.reasons,
                }
            })
            .collect();

        // sort_by is stable: equal relevance keeps closest-first retrieval order
        ranked.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        ranked.truncate(top_k);

        tracing::debug!(
            query = %query,
            candidates,
            returned = ranked.len(),
            duration_ms = start.elapsed().as_millis(),
            "Ranked recommendations"
        );

        Ok(ranked)
    }
}

/// Relevance in [0, 1]: the mean of match fraction and embedding closeness
///
/// Distances outside [0, 1] are clamped so closeness never goes negative.
pub fn blend(match_percentage: f64, distance: f64) -> f64 {
    let closeness = 1.0 - distance.clamp(0.0, 1.0);
    (match_percentage / 100.0 + closeness) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use crate::models::CourseRecord;
    use crate::services::embeddings::{HashEmbeddings, MockEmbeddingProvider};

    fn record(id: &str, program: &str, country: &str, tuition: f64) -> CourseRecord {
        let mut record = CourseRecord::new(id);
        record.university_name = Some(format!("University {id}"));
        record.parent_course = Some(program.to_string());
        record.course_name = Some(format!("MSc {program}"));
        record.program_type = Some("Master's".to_string());
        record.country = Some(country.to_string());
        record.tuition_usd = Some(tuition);
        record
    }

    fn catalog() -> Catalog {
        Catalog::from_records(vec![
            record("1", "Computer Science", "Canada", 20000.0),
            record("2", "Computer Science", "Germany", 0.0),
            record("3", "Fine Arts", "Italy", 15000.0),
            record("4", "Law", "Ireland", 30000.0),
            record("5", "Data Science", "Canada", 40000.0),
            record("6", "Medicine", "Canada", 60000.0),
        ])
    }

    async fn recommender(catalog: Catalog) -> Recommender {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddings::new(128));
        let index = EmbeddingIndex::build(&catalog, provider.as_ref()).await.unwrap();
        Recommender::new(catalog, index, provider, 2)
    }

    fn prefs() -> UserPreferences {
        UserPreferences {
            desired_program: Some("computer science".to_string()),
            preferred_countries: BTreeSet::from(["Canada".to_string()]),
            max_tuition_usd: Some(25000.0),
            ..UserPreferences::new()
        }
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend(100.0, 0.0), 1.0);
        assert_eq!(blend(0.0, 1.0), 0.0);
        assert_eq!(blend(50.0, 0.5), 0.5);
        // Out-of-range distances are clamped
        assert_eq!(blend(0.0, 1.7), 0.0);
        assert_eq!(blend(100.0, -0.1), 1.0);
    }

    #[tokio::test]
    async fn test_recommend_ranks_matching_course_first() {
        let recommender = recommender(catalog()).await;

        let results = recommender.recommend(&prefs(), 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].course.course_id, "1");
        assert_eq!(results[0].match_percentage, 100.0);
        assert!(results[0].reasoning.contains("Computer Science"));
        assert!(results[0].reasoning.contains("Canada"));
        assert!(results[0].reasoning.contains("$20,000"));
        for pair in results.windows(2) {
            assert!(pair[0].relevance_score >= pair[1].relevance_score);
        }
    }

    #[tokio::test]
    async fn test_recommend_is_deterministic() {
        let recommender = recommender(catalog()).await;

        let first = recommender.recommend(&prefs(), 4).await.unwrap();
        let second = recommender.recommend(&prefs(), 4).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_growing_top_k_keeps_prefix() {
        let recommender = recommender(catalog()).await;
        let preferences = UserPreferences {
            desired_program: Some("science".to_string()),
            ..UserPreferences::new()
        };

        // A window of 3 * 2 covers the whole catalog for both calls
        let shorter = recommender.recommend(&preferences, 3).await.unwrap();
        let longer = recommender.recommend(&preferences, 4).await.unwrap();

        assert_eq!(shorter.as_slice(), &longer[..3]);
    }

    #[tokio::test]
    async fn test_unconstrained_preferences_score_zero() {
        let recommender = recommender(catalog()).await;

        let results = recommender
            .recommend(&UserPreferences::new(), 10)
            .await
            .unwrap();

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.match_percentage == 0.0));
        assert!(results.iter().all(|r| r.match_reasons.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_catalog_returns_empty_list() {
        let recommender = recommender(Catalog::default()).await;

        let results = recommender.recommend(&prefs(), 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_top_k_is_rejected() {
        let recommender = recommender(catalog()).await;

        let err = recommender.recommend(&prefs(), 0).await.unwrap_err();
        assert!(matches!(err, AppError::Recommendation(_)));
        assert!(matches!(err.root_cause(), AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported_and_index_stays_usable() {
        let catalog = catalog();
        let index = EmbeddingIndex::build(&catalog, &HashEmbeddings::new(128))
            .await
            .unwrap();

        let mut provider = MockEmbeddingProvider::new();
        let mut calls = 0;
        provider.expect_embed().times(2).returning(move |text| {
            calls += 1;
            if calls == 1 {
                Err(AppError::EmbeddingProvider("timeout".to_string()))
            } else {
                Ok(HashEmbeddings::new(128).embed_text(text))
            }
        });
        let recommender = Recommender::new(catalog, index, Arc::new(provider), 2);

        let err = recommender.recommend(&prefs(), 2).await.unwrap_err();
        assert!(matches!(err.root_cause(), AppError::EmbeddingProvider(_)));

        let results = recommender.recommend(&prefs(), 2).await.unwrap();
        assert_eq!(results.len(), 2);
    }
}
