use serde::{Deserialize, Serialize};

use super::CourseMetadata;

/// A ranked course returned for a single recommendation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub course: CourseMetadata,
    /// Raw embedding distance reported by the index; lower is closer
    pub similarity_score: f64,
    /// Rule-based agreement with the user's preferences, 0-100
    pub match_percentage: f64,
    /// Blend of match percentage and embedding closeness, 0-1
    pub relevance_score: f64,
    /// Attributes that matched, one sentence each
    pub match_reasons: Vec<String>,
    pub reasoning: String,
}
