use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uniscout_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, Cache, CacheWriterHandle},
    services::{
        embeddings::{CachedEmbeddings, EmbeddingProvider, GeminiEmbeddings, HashEmbeddings},
        index::{FileIndexStore, IndexStore, RedisIndexStore},
        CatalogSource, RecommendationEngine,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let (provider, cache_handle) = embedding_provider(&config)?;
    let store = index_store(&config)?;

    let engine = Arc::new(RecommendationEngine::new(
        CatalogSource::File(PathBuf::from(&config.dataset_path)),
        provider,
        store,
        config.overfetch_factor,
    ));

    // The server accepts traffic immediately; /api/v1/ready reports progress
    tokio::spawn(initialize_until_ready(
        Arc::clone(&engine),
        Duration::from_secs(config.init_retry_secs),
    ));

    let state = AppState::new(engine, config.default_top_k, config.max_top_k);
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

fn embedding_provider(
    config: &Config,
) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, Option<CacheWriterHandle>)> {
    let provider: Arc<dyn EmbeddingProvider> =
        match config.embedding_backend.trim().to_lowercase().as_str() {
            "hash" => Arc::new(HashEmbeddings::new(config.hash_embedding_dims)),
            _ => Arc::new(GeminiEmbeddings::new(
                config.gemini_api_key.clone().unwrap_or_default(),
                config.embedding_api_url.clone(),
                config.embedding_model.clone(),
                Duration::from_secs(config.embedding_timeout_secs),
                config.embedding_batch_size,
            )?),
        };

    tracing::info!(model = %provider.model(), "Embedding provider configured");

    match &config.redis_url {
        Some(url) => {
            let (cache, handle) = Cache::new(create_redis_client(url)?);
            let provider = CachedEmbeddings::new(provider, cache, config.query_cache_ttl_secs);
            Ok((Arc::new(provider), Some(handle)))
        }
        None => Ok((provider, None)),
    }
}

fn index_store(config: &Config) -> anyhow::Result<Arc<dyn IndexStore>> {
    match config.index_store.trim().to_lowercase().as_str() {
        "redis" => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required when INDEX_STORE=redis")?;
            let client = create_redis_client(url)?;
            Ok(Arc::new(RedisIndexStore::new(client, config.index_redis_key.clone())))
        }
        _ => Ok(Arc::new(FileIndexStore::new(&config.index_path))),
    }
}

/// Retries initialization after failures until the engine is ready
async fn initialize_until_ready(engine: Arc<RecommendationEngine>, retry_after: Duration) {
    loop {
        match engine.initialize().await {
            Ok(_) => return,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retry_in_secs = retry_after.as_secs(),
                    "Initialization failed, will retry"
                );
                tokio::time::sleep(retry_after).await;
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
