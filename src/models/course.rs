use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single university course as it appears in the catalog dataset
///
/// Field names follow the dataset's column names. Every attribute except the
/// course id may be missing; consumers must treat `None` as "unknown" and
/// never substitute a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "university_course_id", deserialize_with = "required_string")]
    pub course_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub university_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub university_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub university_slug: Option<String>,
    #[serde(
        rename = "university_course_name",
        default,
        deserialize_with = "lenient_string"
    )]
    pub course_name: Option<String>,
    #[serde(
        rename = "course_program_label",
        default,
        deserialize_with = "lenient_string"
    )]
    pub program_label: Option<String>,
    #[serde(
        rename = "parent_course_name",
        default,
        deserialize_with = "lenient_string"
    )]
    pub parent_course: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub program_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub program_type: Option<String>,
    #[serde(
        rename = "university_courses_credential",
        default,
        deserialize_with = "lenient_string"
    )]
    pub credential: Option<String>,
    #[serde(rename = "location_name", default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(rename = "country_name", default, deserialize_with = "lenient_string")]
    pub country: Option<String>,
    #[serde(
        rename = "university_global_rank",
        default,
        deserialize_with = "lenient_u32"
    )]
    pub global_rank: Option<u32>,
    #[serde(
        rename = "university_course_tuition_usd",
        default,
        deserialize_with = "lenient_f64"
    )]
    pub tuition_usd: Option<f64>,
    #[serde(
        rename = "university_course_tuition",
        default,
        deserialize_with = "lenient_f64"
    )]
    pub tuition_local: Option<f64>,
    #[serde(rename = "country_currency", default, deserialize_with = "lenient_string")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub university_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_partner: Option<bool>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub views_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub scholarship_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub gre_required: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tuition_affordability_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub university_quality_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub country_popularity_score: Option<f64>,
}

impl CourseRecord {
    /// Creates a record with only its identity set
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            university_id: None,
            university_name: None,
            university_slug: None,
            course_name: None,
            program_label: None,
            parent_course: None,
            program_level: None,
            program_type: None,
            credential: None,
            location: None,
            country: None,
            global_rank: None,
            tuition_usd: None,
            tuition_local: None,
            currency: None,
            university_type: None,
            is_partner: None,
            is_published: None,
            views_count: None,
            scholarship_count: None,
            gre_required: None,
            tuition_affordability_score: None,
            university_quality_score: None,
            country_popularity_score: None,
        }
    }
}

/// The subset of course attributes stored alongside each embedding
///
/// This is what the index hands back on search, what the scorer inspects, and
/// what callers see in a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMetadata {
    pub course_id: String,
    pub university_id: Option<String>,
    pub university_name: Option<String>,
    pub course_name: Option<String>,
    pub program_level: Option<String>,
    pub program_type: Option<String>,
    pub credential: Option<String>,
    pub parent_course: Option<String>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub global_rank: Option<u32>,
    pub tuition_usd: Option<f64>,
    pub university_type: Option<String>,
    pub currency: Option<String>,
}

impl From<&CourseRecord> for CourseMetadata {
    fn from(record: &CourseRecord) -> Self {
        Self {
            course_id: record.course_id.clone(),
            university_id: record.university_id.clone(),
            university_name: record.university_name.clone(),
            course_name: record.course_name.clone(),
            program_level: record.program_level.clone(),
            program_type: record.program_type.clone(),
            credential: record.credential.clone(),
            parent_course: record.parent_course.clone(),
            location: record.location.clone(),
            country: record.country.clone(),
            global_rank: record.global_rank,
            tuition_usd: record.tuition_usd,
            university_type: record.university_type.clone(),
            currency: record.currency.clone(),
        }
    }
}

// ============================================================================
// Lenient field decoding
// ============================================================================
//
// The dataset is exported from a spreadsheet pipeline: numbers sometimes come
// through as strings, blanks as "" and missing values as null or NaN markers.
// All of those decode to `None` rather than failing the whole catalog.

fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(&value)
        .ok_or_else(|| serde::de::Error::custom("course id must be a non-empty string or number"))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(value_to_f64)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
