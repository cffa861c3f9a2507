use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Embedding of a synthesized search query under a given model
    QueryEmbedding { model: String, query: String },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::QueryEmbedding { model, query } => write!(f, "qemb:{}:{}", model, query),
        }
    }
}

/// Creates a Redis client
///
/// The client is lazy: no connection is made until the first command.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Read-through cache backed by Redis with a background writer
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Asks the writer task to flush pending writes and stop
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::debug!("Cache writer asked to stop");
    }
}

impl Cache {
    /// Creates a cache and spawns its writer task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        (
            Self {
                redis_client,
                write_tx,
            },
            CacheWriterHandle { shutdown_tx },
        )
    }

    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut writer = PipelinedWriter::new(client);

        loop {
            tokio::select! {
                Some(first) = write_rx.recv() => {
                    // Whatever queued up meanwhile goes out in the same round trip
                    let mut batch = vec![first];
                    while batch.len() < MAX_WRITE_BATCH {
                        match write_rx.try_recv() {
                            Ok(msg) => batch.push(msg),
                            Err(_) => break,
                        }
                    }
                    writer.flush(batch).await;
                }
                _ = shutdown_rx.recv() => {
                    let mut pending = Vec::new();
                    while let Ok(msg) = write_rx.try_recv() {
                        pending.push(msg);
                    }
                    if !pending.is_empty() {
                        writer.flush(pending).await;
                    }
                    tracing::info!(failed_writes = writer.failed, "Cache writer stopped");
                    break;
                }
                else => break,
            }
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `Ok(None)` on a miss. Connection and decoding problems are
    /// returned as errors.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key.to_string()).await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| AppError::Internal(format!("undecodable cache entry {}: {}", key, e)))
    }

    /// Like `get_from_cache`, but any failure counts as a miss
    ///
    /// An unavailable cache must never fail the request it was meant to speed up.
    pub async fn lookup<T: serde::de::DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.get_from_cache(key).await {
            Ok(hit) => {
                tracing::debug!(hit = hit.is_some(), "Cache lookup");
                hit
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Queues a value for writing without waiting for Redis
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Value not cacheable");
                return;
            }
        };

        let queued = self.write_tx.send(CacheWriteMessage {
            key: key.to_string(),
            value,
            ttl,
        });
        if queued.is_err() {
            tracing::warn!(key = %key, "Cache writer is gone, dropping write");
        }
    }
}

/// Upper bound on writes sent in one pipeline
const MAX_WRITE_BATCH: usize = 64;

/// Owns the writer task's connection, reconnecting after failures
struct PipelinedWriter {
    client: Client,
    conn: Option<MultiplexedConnection>,
    failed: u64,
}

impl PipelinedWriter {
    fn new(client: Client) -> Self {
        Self {
            client,
            conn: None,
            failed: 0,
        }
    }

    async fn flush(&mut self, batch: Vec<CacheWriteMessage>) {
        let count = batch.len();
        if let Err(e) = self.try_flush(batch).await {
            // Drop the connection so the next batch reconnects
            self.conn = None;
            self.failed += count as u64;
            tracing::warn!(
                error = %e,
                dropped = count,
                failed_writes = self.failed,
                "Cache write failed"
            );
        }
    }

    async fn try_flush(&mut self, batch: Vec<CacheWriteMessage>) -> AppResult<()> {
        if self.conn.is_none() {
            self.conn = Some(self.client.get_multiplexed_async_connection().await?);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Ok(());
        };

        let mut pipe = redis::pipe();
        for msg in batch {
            pipe.set_ex(msg.key, msg.value, msg.ttl).ignore();
        }
        let _: () = pipe.query_async(conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_cache() -> (Cache, CacheWriterHandle) {
        // Port 1 is never a Redis server; every command fails fast
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        Cache::new(client)
    }

    #[test]
    fn test_cache_key_display_query_embedding() {
        let key = CacheKey::QueryEmbedding {
            model: "models/embedding-001".to_string(),
            query: "Program: Computer Science".to_string(),
        };
        assert_eq!(
            key.to_string(),
            "qemb:models/embedding-001:Program: Computer Science"
        );
    }

    #[test]
    fn test_cache_key_preserves_query_case() {
        let lower = CacheKey::QueryEmbedding {
            model: "m".to_string(),
            query: "law".to_string(),
        };
        let upper = CacheKey::QueryEmbedding {
            model: "m".to_string(),
            query: "LAW".to_string(),
        };
        assert_ne!(lower.to_string(), upper.to_string());
    }

    #[tokio::test]
    async fn test_lookup_degrades_to_miss_when_redis_is_down() {
        let (cache, handle) = unreachable_cache();
        let key = CacheKey::QueryEmbedding {
            model: "m".to_string(),
            query: "q".to_string(),
        };

        assert!(cache.get_from_cache::<Vec<f32>>(&key).await.is_err());
        assert_eq!(cache.lookup::<Vec<f32>>(&key).await, None);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_set_in_background_does_not_block_when_redis_is_down() {
        let (cache, handle) = unreachable_cache();
        let key = CacheKey::QueryEmbedding {
            model: "m".to_string(),
            query: "q".to_string(),
        };

        cache.set_in_background(&key, &vec![0.5_f32, 0.5], 60);
        handle.shutdown().await;
    }
}
