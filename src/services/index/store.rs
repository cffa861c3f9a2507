//! Durable storage for a built embedding index
//!
//! Persisting is best effort and restoring is defensive: anything unexpected
//! in a stored blob (corruption, older format, another embedding model, a
//! catalog that has changed since the build) yields "nothing to restore" so
//! the caller rebuilds.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::CourseMetadata,
    services::{
        catalog::Catalog,
        index::{render_document, EmbeddedDocument, EmbeddingIndex, IndexSource},
    },
};

/// Bumped whenever the persisted layout or the document text changes
pub const FORMAT_VERSION: u32 = 1;

/// Opaque blob storage for a serialized index
#[async_trait::async_trait]
pub trait IndexStore: Send + Sync {
    /// Returns `None` when nothing has been stored yet
    async fn read(&self) -> AppResult<Option<Vec<u8>>>;

    async fn write(&self, bytes: Vec<u8>) -> AppResult<()>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Stores the index as a single file
#[derive(Debug, Clone)]
pub struct FileIndexStore {
    path: PathBuf,
}

impl FileIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl IndexStore for FileIndexStore {
    async fn read(&self) -> AppResult<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::IndexStore(format!(
                "cannot read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, bytes: Vec<u8>) -> AppResult<()> {
        let io_error =
            |e: std::io::Error| AppError::IndexStore(format!("cannot write {}: {}", self.path.display(), e));

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        // Write then rename so a crash never leaves a half-written index behind
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_error)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Stores the index under a single Redis key, without expiry
#[derive(Clone)]
pub struct RedisIndexStore {
    redis_client: redis::Client,
    key: String,
}

impl RedisIndexStore {
    pub fn new(redis_client: redis::Client, key: impl Into<String>) -> Self {
        Self {
            redis_client,
            key: key.into(),
        }
    }
}

#[async_trait::async_trait]
impl IndexStore for RedisIndexStore {
    async fn read(&self) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let bytes: Option<Vec<u8>> = conn.get(&self.key).await?;
        Ok(bytes)
    }

    async fn write(&self, bytes: Vec<u8>) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.set(&self.key, bytes).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redis:{}", self.key)
    }
}

/// Why a stored index was not usable
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("stored index cannot be read: {0}")]
    Unreadable(#[from] AppError),

    #[error("stored index is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("stored index has format version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("stored index was built with model {found}, current model is {expected}")]
    ModelMismatch { found: String, expected: String },

    #[error("stored vector for course {0} does not match the index dimension")]
    BadVector(String),

    #[error("stored index does not match the catalog: {0}")]
    CatalogDrift(String),
}

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    format_version: u32,
    model: &'a str,
    dimension: usize,
    built_at: DateTime<Utc>,
    documents: &'a [EmbeddedDocument],
}

#[derive(Deserialize)]
struct PersistedIndex {
    format_version: u32,
    model: String,
    dimension: usize,
    built_at: DateTime<Utc>,
    documents: Vec<EmbeddedDocument>,
}

impl EmbeddingIndex {
    /// Serializes the index with its format header
    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        serde_json::to_vec(&PersistedIndexRef {
            format_version: FORMAT_VERSION,
            model: self.model(),
            dimension: self.dimension(),
            built_at: self.built_at(),
            documents: self.documents(),
        })
        .map_err(|e| AppError::Internal(format!("index serialization error: {}", e)))
    }

    /// Decodes a stored index and checks it against the current catalog and model
    ///
    /// A stored document is only reused when its text is exactly what the
    /// current catalog record renders to; metadata is taken from the catalog.
    pub fn from_bytes(bytes: &[u8], catalog: &Catalog, model: &str) -> Result<Self, RestoreError> {
        let stored: PersistedIndex = serde_json::from_slice(bytes)?;

        if stored.format_version != FORMAT_VERSION {
            return Err(RestoreError::VersionMismatch {
                found: stored.format_version,
                expected: FORMAT_VERSION,
            });
        }
        if stored.model != model {
            return Err(RestoreError::ModelMismatch {
                found: stored.model,
                expected: model.to_string(),
            });
        }
        if stored.documents.len() != catalog.len() {
            return Err(RestoreError::CatalogDrift(format!(
                "{} stored documents, {} catalog records",
                stored.documents.len(),
                catalog.len()
            )));
        }

        let mut by_id: HashMap<String, EmbeddedDocument> = stored
            .documents
            .into_iter()
            .map(|doc| (doc.metadata.course_id.clone(), doc))
            .collect();

        let mut documents = Vec::with_capacity(catalog.len());
        for record in catalog.records() {
            let doc = by_id.remove(&record.course_id).ok_or_else(|| {
                RestoreError::CatalogDrift(format!("course {} is not stored", record.course_id))
            })?;

            let text = render_document(record);
            if doc.text != text {
                return Err(RestoreError::CatalogDrift(format!(
                    "course {} has changed",
                    record.course_id
                )));
            }
            if doc.vector.len() != stored.dimension || doc.vector.iter().any(|v| !v.is_finite()) {
                return Err(RestoreError::BadVector(record.course_id.clone()));
            }

            documents.push(EmbeddedDocument {
                text,
                metadata: CourseMetadata::from(record),
                vector: doc.vector,
            });
        }

        Ok(Self::from_parts(
            model.to_string(),
            stored.dimension,
            stored.built_at,
            IndexSource::Restored,
            documents,
        ))
    }

    /// Writes the index to `store`, logging instead of failing
    ///
    /// Returns whether the write succeeded.
    pub async fn persist(&self, store: &dyn IndexStore) -> bool {
        let start = Instant::now();

        let result = match self.to_bytes() {
            Ok(bytes) => {
                let size = bytes.len();
                store.write(bytes).await.map(|_| size)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(bytes) => {
                tracing::info!(
                    location = %store.describe(),
                    bytes,
                    duration_ms = start.elapsed().as_millis(),
                    "Embedding index persisted"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    location = %store.describe(),
                    error = %e,
                    "Failed to persist embedding index, continuing with in-memory index"
                );
                false
            }
        }
    }

    async fn try_restore(
        store: &dyn IndexStore,
        catalog: &Catalog,
        model: &str,
    ) -> Result<Option<Self>, RestoreError> {
        let Some(bytes) = store.read().await? else {
            return Ok(None);
        };
        Self::from_bytes(&bytes, catalog, model).map(Some)
    }

    /// Loads a previously persisted index, if there is a usable one
    pub async fn restore(store: &dyn IndexStore, catalog: &Catalog, model: &str) -> Option<Self> {
        let start = Instant::now();

        match Self::try_restore(store, catalog, model).await {
            Ok(Some(index)) => {
                tracing::info!(
                    location = %store.describe(),
                    documents = index.len(),
                    built_at = %index.built_at(),
                    duration_ms = start.elapsed().as_millis(),
                    "Embedding index restored"
                );
                Some(index)
            }
            Ok(None) => {
                tracing::info!(location = %store.describe(), "No persisted embedding index found");
                None
            }
            Err(e) => {
                tracing::warn!(
                    location = %store.describe(),
                    error = %e,
                    "Persisted embedding index unusable, will rebuild"
                );
                None
            }
        }
    }
}
