use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// What a user is looking for in a university course
///
/// Every field is optional. An absent field (including an empty string or an
/// empty list) means "no constraint": it neither contributes to the search
/// query nor to the match score. Countries, locations and university types are
/// sets: order and repeats in the request do not matter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub desired_program: Option<String>,
    #[serde(default)]
    pub program_level: Option<String>,
    #[serde(default)]
    pub program_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub preferred_countries: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub preferred_locations: BTreeSet<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub university_types: BTreeSet<String>,
    /// Upper bound on annual tuition in USD
    #[serde(default)]
    pub max_tuition_usd: Option<f64>,
    /// A course qualifies when its global rank is at or better than this value
    #[serde(default)]
    pub min_global_rank: Option<u32>,
    #[serde(default)]
    pub additional_preferences: Option<String>,
}

impl UserPreferences {
    /// Creates preferences with no constraints set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired_program(&self) -> Option<&str> {
        non_blank(&self.desired_program)
    }

    pub fn program_level(&self) -> Option<&str> {
        non_blank(&self.program_level)
    }

    pub fn program_type(&self) -> Option<&str> {
        non_blank(&self.program_type)
    }

    pub fn additional_preferences(&self) -> Option<&str> {
        non_blank(&self.additional_preferences)
    }

    pub fn countries(&self) -> Option<&BTreeSet<String>> {
        non_empty(&self.preferred_countries)
    }

    pub fn locations(&self) -> Option<&BTreeSet<String>> {
        non_empty(&self.preferred_locations)
    }

    pub fn university_types(&self) -> Option<&BTreeSet<String>> {
        non_empty(&self.university_types)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn non_empty(values: &BTreeSet<String>) -> Option<&BTreeSet<String>> {
    (!values.is_empty()).then_some(values)
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
