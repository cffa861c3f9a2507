use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::CourseRecord,
};

/// Degree types offered in the "previous degree" picker
pub const PREVIOUS_DEGREES: &[&str] = &[
    "Bachelor's Degree",
    "Master's Degree",
    "PhD/Doctorate",
    "Associate's Degree",
    "Diploma",
    "High School Diploma",
    "Certificate",
    "Foundation Year",
    "A-Levels",
    "IB Diploma",
];

/// Fields of study offered in the "previous course" picker
pub const PREVIOUS_COURSES: &[&str] = &[
    "Computer Science",
    "Information Technology",
    "Business Administration",
    "Engineering",
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "Economics",
    "Psychology",
    "Sociology",
    "History",
    "English Literature",
    "Political Science",
    "International Relations",
    "Medicine",
    "Law",
    "Education",
    "Arts",
    "Music",
    "Design",
    "Architecture",
    "Accounting",
    "Finance",
    "Marketing",
    "Human Resources",
    "Nursing",
    "Pharmacy",
    "Agriculture",
    "Environmental Science",
];

/// The in-memory course catalog
///
/// Loaded once at startup and shared read-only between requests.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<CourseRecord>,
}

impl Catalog {
    /// Reads the catalog from a JSON array of course records
    ///
    /// Fails with `DataLoad` when the file is missing, cannot be parsed, or
    /// contains no records. A partially readable catalog is never accepted.
    pub async fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::DataLoad(format!("cannot read {}: {}", path.display(), e))
        })?;

        let records: Vec<CourseRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::DataLoad(format!("cannot parse {}: {}", path.display(), e))
        })?;

        if records.is_empty() {
            return Err(AppError::DataLoad(format!(
                "{} contains no course records",
                path.display()
            )));
        }

        let catalog = Self::from_records(records);

        tracing::info!(
            path = %path.display(),
            courses = catalog.len(),
            "Course catalog loaded"
        );

        Ok(catalog)
    }

    /// Builds a catalog from already decoded records
    ///
    /// Records repeating an earlier course id are dropped so that every id
    /// identifies exactly one record.
    pub fn from_records(records: Vec<CourseRecord>) -> Self {
        let mut seen = HashSet::with_capacity(records.len());
        let total = records.len();

        let records: Vec<CourseRecord> = records
            .into_iter()
            .filter(|record| seen.insert(record.course_id.clone()))
            .collect();

        if records.len() < total {
            tracing::warn!(
                dropped = total - records.len(),
                "Duplicate course ids in catalog, keeping first occurrence"
            );
        }

        Self { records }
    }

    pub fn records(&self) -> &[CourseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct parent-course names, most common first
    pub fn available_programs(&self) -> Vec<String> {
        by_popularity(self.records.iter().filter_map(|r| r.parent_course.as_deref()))
    }

    /// Distinct countries, most common first
    pub fn available_countries(&self) -> Vec<String> {
        by_popularity(self.records.iter().filter_map(|r| r.country.as_deref()))
    }

    /// Distinct locations in alphabetical order
    pub fn available_locations(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.location.as_deref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

/// Orders distinct values by descending frequency, alphabetically on ties
fn by_popularity<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(value, _)| value.to_string()).collect()
}
