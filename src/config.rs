use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the JSON course catalog
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,

    /// Embedding backend: "gemini" or "hash"
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: String,

    /// Gemini API key, required for the gemini backend
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Embedding API base URL
    #[serde(default = "default_embedding_api_url")]
    pub embedding_api_url: String,

    /// Embedding model identifier
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Timeout for a single embedding request
    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_timeout_secs: u64,

    /// Number of documents sent per batch embedding request
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    /// Vector dimension for the hash backend
    #[serde(default = "default_hash_embedding_dims")]
    pub hash_embedding_dims: usize,

    /// Where the built index is persisted: "file" or "redis"
    #[serde(default = "default_index_store")]
    pub index_store: String,

    /// File location of the persisted index
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Redis key of the persisted index
    #[serde(default = "default_index_redis_key")]
    pub index_redis_key: String,

    /// Redis connection URL; enables query embedding caching when set
    #[serde(default)]
    pub redis_url: Option<String>,

    /// TTL for cached query embeddings
    #[serde(default = "default_query_cache_ttl_secs")]
    pub query_cache_ttl_secs: u64,

    /// Candidates retrieved per requested recommendation
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: usize,

    /// Recommendations returned when a request does not say
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest accepted top_k
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Delay before retrying a failed initialization
    #[serde(default = "default_init_retry_secs")]
    pub init_retry_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_dataset_path() -> String {
    "data/university_courses.json".to_string()
}

fn default_embedding_backend() -> String {
    "gemini".to_string()
}

fn default_embedding_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_embedding_model() -> String {
    "models/embedding-001".to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_embedding_batch_size() -> usize {
    100
}

fn default_hash_embedding_dims() -> usize {
    384
}

fn default_index_store() -> String {
    "file".to_string()
}

fn default_index_path() -> String {
    "vector_store_cache/index.json".to_string()
}

fn default_index_redis_key() -> String {
    "uniscout:index:v1".to_string()
}

fn default_query_cache_ttl_secs() -> u64 {
    86400
}

fn default_overfetch_factor() -> usize {
    2
}

fn default_top_k() -> usize {
    10
}

fn default_max_top_k() -> usize {
    50
}

fn default_init_retry_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that cannot work together
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.embedding_backend.trim().to_lowercase().as_str() {
            "gemini" => {
                if self
                    .gemini_api_key
                    .as_deref()
                    .map_or(true, |k| k.trim().is_empty())
                {
                    anyhow::bail!("GEMINI_API_KEY is required when EMBEDDING_BACKEND=gemini");
                }
                if self.embedding_batch_size == 0 {
                    anyhow::bail!("EMBEDDING_BATCH_SIZE must be greater than 0");
                }
            }
            "hash" => {
                if self.hash_embedding_dims == 0 {
                    anyhow::bail!("HASH_EMBEDDING_DIMS must be greater than 0");
                }
            }
            other => anyhow::bail!("Unknown EMBEDDING_BACKEND: {}", other),
        }

        match self.index_store.trim().to_lowercase().as_str() {
            "file" => {}
            "redis" => {
                if self.redis_url.is_none() {
                    anyhow::bail!("REDIS_URL is required when INDEX_STORE=redis");
                }
            }
            other => anyhow::bail!("Unknown INDEX_STORE: {}", other),
        }

        if self.overfetch_factor == 0 {
            anyhow::bail!("OVERFETCH_FACTOR must be at least 1");
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            anyhow::bail!(
                "DEFAULT_TOP_K must be between 1 and MAX_TOP_K ({})",
                self.max_top_k
            );
        }

        Ok(())
    }
}
