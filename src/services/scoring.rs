use std::collections::BTreeSet;

use crate::models::{CourseMetadata, UserPreferences};

/// Points a course earned for one rule, and why
struct RuleHit {
    points: f64,
    reason: String,
}

/// A weighted preference category
///
/// `applies` decides whether the category counts toward the possible total
/// for this (course, preferences) pair. `evaluate` is only called when it
/// does, and returns the earned points and reason on a full or partial match.
struct MatchRule {
    weight: f64,
    applies: fn(&CourseMetadata, &UserPreferences) -> bool,
    evaluate: fn(&CourseMetadata, &UserPreferences) -> Option<RuleHit>,
}

const RULES: &[MatchRule] = &[
    MatchRule {
        weight: 25.0,
        applies: |_, prefs| prefs.desired_program().is_some(),
        evaluate: program_match,
    },
    MatchRule {
        weight: 15.0,
        applies: |_, prefs| prefs.program_level().is_some(),
        evaluate: level_match,
    },
    MatchRule {
        weight: 20.0,
        applies: |_, prefs| prefs.countries().is_some(),
        evaluate: country_match,
    },
    MatchRule {
        weight: 15.0,
        applies: |_, prefs| prefs.university_types().is_some(),
        evaluate: university_type_match,
    },
    // A course without a known tuition or rank cannot be judged on it, so the
    // category is left out rather than counted as a miss
    MatchRule {
        weight: 15.0,
        applies: |course, prefs| prefs.max_tuition_usd.is_some() && course.tuition_usd.is_some(),
        evaluate: tuition_match,
    },
    MatchRule {
        weight: 10.0,
        applies: |course, prefs| prefs.min_global_rank.is_some() && course.global_rank.is_some(),
        evaluate: rank_match,
    },
];

/// Points for a desired program found only in the course name
const COURSE_NAME_PROGRAM_POINTS: f64 = 20.0;

/// Result of scoring one course against one set of preferences
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Earned points over possible points, 0-100; 0 when nothing applies
    pub percentage: f64,
    /// One sentence per matched category, in rule order
    pub reasons: Vec<String>,
}

/// Scores a course against user preferences
pub fn score(course: &CourseMetadata, preferences: &UserPreferences) -> MatchOutcome {
    let mut earned = 0.0;
    let mut possible = 0.0;
    let mut reasons = Vec::new();

    for rule in RULES {
        if !(rule.applies)(course, preferences) {
            continue;
        }
        possible += rule.weight;
        if let Some(hit) = (rule.evaluate)(course, preferences) {
            earned += hit.points.min(rule.weight);
            reasons.push(hit.reason);
        }
    }

    let percentage = if possible > 0.0 {
        (earned / possible * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    MatchOutcome {
        percentage,
        reasons,
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

fn is_listed(value: Option<&str>, set: Option<&BTreeSet<String>>) -> bool {
    match (value, set) {
        (Some(value), Some(set)) => set.contains(value),
        _ => false,
    }
}

fn program_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    let wanted = prefs.desired_program()?;

    if contains_ignore_case(course.parent_course.as_deref(), wanted) {
        return Some(RuleHit {
            points: 25.0,
            reason: format!("Program match: {}", course.parent_course.as_deref()?),
        });
    }
    if contains_ignore_case(course.course_name.as_deref(), wanted) {
        return Some(RuleHit {
            points: COURSE_NAME_PROGRAM_POINTS,
            reason: format!("Related course: {}", course.course_name.as_deref()?),
        });
    }
    None
}

fn level_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    let wanted = prefs.program_level()?;
    let program_type = course.program_type.as_deref()?;

    contains_ignore_case(Some(program_type), wanted).then(|| RuleHit {
        points: 15.0,
        reason: format!("Program level match: {}", program_type),
    })
}

fn country_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    is_listed(course.country.as_deref(), prefs.countries()).then(|| RuleHit {
        points: 20.0,
        reason: format!(
            "Located in your preferred country: {}",
            course.country.as_deref().unwrap_or_default()
        ),
    })
}

fn university_type_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    is_listed(course.university_type.as_deref(), prefs.university_types()).then(|| RuleHit {
        points: 15.0,
        reason: format!(
            "Preferred university type: {}",
            course.university_type.as_deref().unwrap_or_default()
        ),
    })
}

fn tuition_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    let tuition = course.tuition_usd?;
    let budget = prefs.max_tuition_usd?;

    (tuition <= budget).then(|| RuleHit {
        points: 15.0,
        reason: format!("Within your budget: {}", format_usd(tuition)),
    })
}

fn rank_match(course: &CourseMetadata, prefs: &UserPreferences) -> Option<RuleHit> {
    let rank = course.global_rank?;
    let threshold = prefs.min_global_rank?;

    (rank <= threshold).then(|| RuleHit {
        points: 10.0,
        reason: format!("Meets your ranking criteria: #{}", rank),
    })
}

/// Summarizes an outcome as one paragraph for the response
pub fn compose_reasoning(outcome: &MatchOutcome) -> String {
    if outcome.reasons.is_empty() {
        return format!(
            "This course matches {:.1}% of your preferences. \
             It was selected for its overall similarity to your search.",
            outcome.percentage
        );
    }

    format!(
        "This course matches {:.1}% of your preferences. Key factors: {}.",
        outcome.percentage,
        outcome.reasons.join("; ")
    )
}

/// Formats a dollar amount rounded to whole dollars with thousands separators
pub fn format_usd(amount: f64) -> String {
    let rounded = amount.round().abs() as u64;
    let digits = rounded.to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if amount.round() < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}
