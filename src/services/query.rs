use std::collections::BTreeSet;

use crate::models::UserPreferences;

/// Builds the search text embedded for a set of preferences
///
/// Only present fields are rendered, always in the same order, and list
/// values come out sorted. Equal preferences therefore produce byte-identical
/// queries (and hit the same cache entry).
pub fn build_query(preferences: &UserPreferences) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(program) = preferences.desired_program() {
        parts.push(format!("Program: {}", program));
    }
    if let Some(level) = preferences.program_level() {
        parts.push(format!("Level: {}", level));
    }
    if let Some(degree) = preferences.program_type() {
        parts.push(format!("Degree: {}", degree));
    }
    if let Some(countries) = preferences.countries() {
        parts.push(format!("Countries: {}", join(countries)));
    }
    if let Some(locations) = preferences.locations() {
        parts.push(format!("Locations: {}", join(locations)));
    }
    if let Some(types) = preferences.university_types() {
        parts.push(format!("University Types: {}", join(types)));
    }
    if let Some(extra) = preferences.additional_preferences() {
        parts.push(format!("Additional: {}", extra));
    }

    parts.join(" ")
}

fn join(values: &BTreeSet<String>) -> String {
    values
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
