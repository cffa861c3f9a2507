//! Gemini embedding provider (Generative Language API)
//!
//! Queries are embedded with `:embedContent` and task type `RETRIEVAL_QUERY`;
//! catalog documents with `:batchEmbedContents` and `RETRIEVAL_DOCUMENT`,
//! chunked to the configured batch size.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    services::embeddings::{validate_vector, validate_vectors, EmbeddingProvider},
};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct GeminiEmbeddings {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GeminiEmbeddings {
    /// Creates a client; `timeout` bounds every request to the API
    pub fn new(
        api_key: String,
        api_url: String,
        model: String,
        timeout: Duration,
        batch_size: usize,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Gemini API key cannot be empty".to_string(),
            ));
        }

        let http_client = HttpClient::builder().timeout(timeout).build()?;

        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            batch_size: batch_size.max(1),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/{}:{}", self.api_url, self.model, method)
    }

    fn request<'a>(&'a self, text: &'a str, task_type: &'static str) -> EmbedContentRequest<'a> {
        EmbedContentRequest {
            model: &self.model,
            content: Content {
                parts: [Part { text }],
            },
            task_type,
        }
    }

    async fn post<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> AppResult<R> {
        let response = self
            .http_client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingProvider(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        response.json::<R>().await.map_err(|e| {
            AppError::EmbeddingProvider(format!("malformed Gemini response: {}", e))
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let body = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|t| self.request(t, "RETRIEVAL_DOCUMENT"))
                .collect(),
        };

        let response: BatchEmbedContentsResponse =
            self.post(&self.endpoint("batchEmbedContents"), &body).await?;

        let vectors: Vec<Vec<f32>> = response.embeddings.into_iter().map(|e| e.values).collect();
        validate_vectors(texts.len(), &vectors)?;
        Ok(vectors)
    }
}

fn provider_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::EmbeddingProvider(format!("Gemini request timed out: {}", e))
    } else {
        AppError::EmbeddingProvider(format!("Gemini request failed: {}", e))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiEmbeddings {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let body = self.request(text, "RETRIEVAL_QUERY");
        let response: EmbedContentResponse =
            self.post(&self.endpoint("embedContent"), &body).await?;

        validate_vector(&response.embedding.values)?;
        Ok(response.embedding.values)
    }

    async fn embed_many(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        let total_batches = texts.len().div_ceil(self.batch_size);

        for (batch, chunk) in texts.chunks(self.batch_size).enumerate() {
            let chunk_vectors = self.embed_chunk(chunk).await?;
            vectors.extend(chunk_vectors);

            tracing::debug!(
                batch = batch + 1,
                total_batches,
                embedded = vectors.len(),
                "Embedded document batch"
            );
        }

        // Dimensions must agree across batches too
        validate_vectors(texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
