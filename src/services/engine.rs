//! Lifecycle of the recommendation core
//!
//! Owns the one-time initialization (catalog load, then index restore or
//! build) and hands out the ready `Recommender` afterwards. Initialization is
//! single-flight: concurrent callers await the same attempt and share its
//! outcome, failures included. A call made after a failed attempt has
//! finished starts a new one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell, RwLock};

use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, UserPreferences},
    services::{
        catalog::{Catalog, PREVIOUS_COURSES, PREVIOUS_DEGREES},
        embeddings::EmbeddingProvider,
        index::{EmbeddingIndex, IndexSource, IndexStore},
        recommendations::Recommender,
    },
};

/// Where the catalog comes from
#[derive(Debug, Clone)]
pub enum CatalogSource {
    File(PathBuf),
    InMemory(Catalog),
}

impl CatalogSource {
    async fn load(&self) -> AppResult<Catalog> {
        match self {
            CatalogSource::File(path) => Catalog::load(path).await,
            CatalogSource::InMemory(catalog) => Ok(catalog.clone()),
        }
    }
}

/// Readiness as reported by `/api/v1/ready`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InitState {
    Idle,
    Initializing,
    Ready {
        courses: usize,
        index_source: IndexSource,
        initialized_at: DateTime<Utc>,
    },
    Failed {
        error: String,
    },
}

/// Option lists for the preference form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormOptions {
    pub programs: Vec<String>,
    pub countries: Vec<String>,
    pub locations: Vec<String>,
    pub previous_degrees: Vec<String>,
    pub previous_courses: Vec<String>,
}

pub struct RecommendationEngine {
    source: CatalogSource,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn IndexStore>,
    overfetch_factor: usize,
    ready: OnceCell<Arc<Recommender>>,
    state: RwLock<InitState>,
    /// Finished initialization attempts
    attempts: AtomicU64,
    /// Held for the whole of an attempt; keeps the error of the last one
    last_failure: Mutex<Option<AppError>>,
}

impl RecommendationEngine {
    pub fn new(
        source: CatalogSource,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn IndexStore>,
        overfetch_factor: usize,
    ) -> Self {
        Self {
            source,
            provider,
            store,
            overfetch_factor,
            ready: OnceCell::new(),
            state: RwLock::new(InitState::Idle),
            attempts: AtomicU64::new(0),
            last_failure: Mutex::new(None),
        }
    }

    /// Loads the catalog and makes the index queryable
    ///
    /// Returns immediately once ready. While an attempt is running, other
    /// callers wait for it and get its result instead of starting their own.
    pub async fn initialize(&self) -> AppResult<Arc<Recommender>> {
        if let Some(recommender) = self.ready.get() {
            return Ok(Arc::clone(recommender));
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.last_failure.lock().await;

        if let Some(recommender) = self.ready.get() {
            return Ok(Arc::clone(recommender));
        }
        // An attempt finished while we waited for the lock
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(error) = last_failure.as_ref() {
                return Err(error.duplicate());
            }
        }

        *self.state.write().await = InitState::Initializing;
        let result = self.build_recommender().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(recommender) => {
                *self.state.write().await = InitState::Ready {
                    courses: recommender.catalog().len(),
                    index_source: recommender.index().source(),
                    initialized_at: Utc::now(),
                };
                *last_failure = None;
                let recommender = self
                    .ready
                    .get_or_init(|| async { Arc::new(recommender) })
                    .await;
                Ok(Arc::clone(recommender))
            }
            Err(e) => {
                tracing::error!(error = %e, "Recommendation engine initialization failed");
                *self.state.write().await = InitState::Failed {
                    error: e.to_string(),
                };
                *last_failure = Some(e.duplicate());
                Err(e)
            }
        }
    }

    async fn build_recommender(&self) -> AppResult<Recommender> {
        let start = Instant::now();
        let catalog = self.source.load().await?;
        let model = self.provider.model();

        tracing::info!(
            courses = catalog.len(),
            model = %model,
            store = %self.store.describe(),
            "Initializing recommendation engine"
        );

        let index = match EmbeddingIndex::restore(self.store.as_ref(), &catalog, &model).await {
            Some(index) => index,
            None => {
                let index = EmbeddingIndex::build(&catalog, self.provider.as_ref()).await?;
                index.persist(self.store.as_ref()).await;
                index
            }
        };

        tracing::info!(
            courses = catalog.len(),
            source = ?index.source(),
            duration_ms = start.elapsed().as_millis(),
            "Recommendation engine ready"
        );

        Ok(Recommender::new(
            catalog,
            index,
            Arc::clone(&self.provider),
            self.overfetch_factor,
        ))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    pub async fn status(&self) -> InitState {
        self.state.read().await.clone()
    }

    fn recommender(&self) -> AppResult<&Arc<Recommender>> {
        self.ready.get().ok_or(AppError::NotReady)
    }

    /// Ranks courses for `preferences`; fails with `NotReady` before initialization
    pub async fn recommend(
        &self,
        preferences: &UserPreferences,
        top_k: usize,
    ) -> AppResult<Vec<Recommendation>> {
        let recommender = self.recommender().map_err(AppError::recommendation)?;
        recommender.recommend(preferences, top_k).await
    }

    pub fn available_programs(&self) -> AppResult<Vec<String>> {
        Ok(self.recommender()?.catalog().available_programs())
    }

    pub fn available_countries(&self) -> AppResult<Vec<String>> {
        Ok(self.recommender()?.catalog().available_countries())
    }

    pub fn available_locations(&self) -> AppResult<Vec<String>> {
        Ok(self.recommender()?.catalog().available_locations())
    }

    pub fn form_options(&self) -> AppResult<FormOptions> {
        let catalog = self.recommender()?.catalog();
        Ok(FormOptions {
            programs: catalog.available_programs(),
            countries: catalog.available_countries(),
            locations: catalog.available_locations(),
            previous_degrees: PREVIOUS_DEGREES.iter().map(|s| s.to_string()).collect(),
            previous_courses: PREVIOUS_COURSES.iter().map(|s| s.to_string()).collect(),
        })
    }
}
