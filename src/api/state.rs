use std::sync::Arc;

use crate::services::RecommendationEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RecommendationEngine>,
    /// Results returned when a request does not set `top_k`
    pub default_top_k: usize,
    pub max_top_k: usize,
}

impl AppState {
    pub fn new(engine: Arc<RecommendationEngine>, default_top_k: usize, max_top_k: usize) -> Self {
        Self {
            engine,
            default_top_k,
            max_top_k,
        }
    }
}
