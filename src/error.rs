use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Seconds a client should wait before retrying while the index is warming up
pub const NOT_READY_RETRY_AFTER_SECS: u64 = 60;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Catalog load error: {0}")]
    DataLoad(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Recommendation failed: {0}")]
    Recommendation(Box<AppError>),

    #[error("Recommendation service is still initializing")]
    NotReady,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Index store error: {0}")]
    IndexStore(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wraps an error raised while serving a single recommendation request
    pub fn recommendation(cause: AppError) -> Self {
        match cause {
            AppError::Recommendation(_) => cause,
            other => AppError::Recommendation(Box::new(other)),
        }
    }

    /// The innermost cause, looking through recommendation wrappers
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::Recommendation(inner) => inner.root_cause(),
            other => other,
        }
    }

    /// A copy that keeps the variant where it can
    ///
    /// Client-library errors are not `Clone`; they are carried over as text
    /// under the variant that maps to the same status.
    pub fn duplicate(&self) -> AppError {
        match self {
            AppError::DataLoad(msg) => AppError::DataLoad(msg.clone()),
            AppError::EmbeddingProvider(msg) => AppError::EmbeddingProvider(msg.clone()),
            AppError::Recommendation(inner) => AppError::Recommendation(Box::new(inner.duplicate())),
            AppError::NotReady => AppError::NotReady,
            AppError::InvalidInput(msg) => AppError::InvalidInput(msg.clone()),
            AppError::IndexStore(msg) => AppError::IndexStore(msg.clone()),
            AppError::Cache(e) => AppError::Internal(e.to_string()),
            AppError::HttpClient(e) => AppError::EmbeddingProvider(e.to_string()),
            AppError::Internal(msg) => AppError::Internal(msg.clone()),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.root_cause() {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::EmbeddingProvider(_) | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }

        let body = if status == StatusCode::SERVICE_UNAVAILABLE {
            Json(json!({
                "error": self.to_string(),
                "retry_after": NOT_READY_RETRY_AFTER_SECS,
            }))
        } else {
            Json(json!({
                "error": self.to_string()
            }))
        };

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
