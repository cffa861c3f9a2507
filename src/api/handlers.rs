use std::time::Instant;

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{Recommendation, UserPreferences},
    services::{FormOptions, InitState},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    #[serde(flatten)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub count: usize,
    pub search_duration_ms: u64,
}

// Handlers

/// Liveness check
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Readiness check: 200 once the index is queryable, 503 before
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.engine.status().await {
        InitState::Ready {
            courses,
            index_source,
            initialized_at,
        } => (
            StatusCode::OK,
            Json(json!({
                "ready": true,
                "status": "ready",
                "courses": courses,
                "index_source": index_source,
                "initialized_at": initialized_at,
            })),
        ),
        InitState::Failed { error } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "status": "failed", "error": error })),
        ),
        InitState::Idle | InitState::Initializing => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "status": "initializing" })),
        ),
    }
}

/// Ranks courses for the submitted preferences
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let top_k = request.top_k.unwrap_or(state.default_top_k);
    if top_k == 0 || top_k > state.max_top_k {
        return Err(AppError::InvalidInput(format!(
            "top_k must be between 1 and {}",
            state.max_top_k
        )));
    }

    tracing::info!(
        request_id = %request_id,
        top_k,
        program = request.preferences.desired_program().unwrap_or("-"),
        countries = request.preferences.preferred_countries.len(),
        "Processing recommendation request"
    );

    let start = Instant::now();
    let recommendations = state.engine.recommend(&request.preferences, top_k).await?;
    let search_duration_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        request_id = %request_id,
        count = recommendations.len(),
        search_duration_ms,
        "Recommendations ready"
    );

    Ok(Json(RecommendationResponse {
        count: recommendations.len(),
        recommendations,
        search_duration_ms,
    }))
}

/// Picker data for the preference form
pub async fn options(State(state): State<AppState>) -> AppResult<Json<FormOptions>> {
    Ok(Json(state.engine.form_options()?))
}
