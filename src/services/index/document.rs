use serde::{Deserialize, Serialize};

use crate::models::{CourseMetadata, CourseRecord};

/// Placeholder rendered for attributes the catalog does not have
pub const MISSING: &str = "N/A";

/// One catalog record as stored in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedDocument {
    pub text: String,
    pub metadata: CourseMetadata,
    pub vector: Vec<f32>,
}

/// Renders the text that gets embedded for a course
///
/// The field order and labels are fixed. Changing them changes every vector,
/// which invalidates persisted indexes (restore compares this text).
pub fn render_document(record: &CourseRecord) -> String {
    [
        format!("University: {}", text(&record.university_name)),
        format!("Course: {}", text(&record.course_name)),
        format!("Program: {}", text(&record.program_label)),
        format!("Parent Course: {}", text(&record.parent_course)),
        format!(
            "Level: {} - {}",
            text(&record.program_type),
            text(&record.credential)
        ),
        format!(
            "Location: {}, {}",
            text(&record.location),
            text(&record.country)
        ),
        format!(
            "Global Rank: {}",
            record
                .global_rank
                .map_or_else(|| MISSING.to_string(), |r| r.to_string())
        ),
        format!(
            "Tuition (USD): ${}",
            record
                .tuition_usd
                .map_or_else(|| MISSING.to_string(), format_amount)
        ),
        format!("University Type: {}", text(&record.university_type)),
    ]
    .join("\n")
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(MISSING)
}

/// Whole amounts without a fractional part, everything else with two decimals
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{:.0}", amount)
    } else {
        format!("{:.2}", amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_full_record() {
        let mut record = CourseRecord::new("1");
        record.university_name = Some("University of Toronto".to_string());
        record.course_name = Some("MSc Computer Science".to_string());
        record.program_label = Some("Computer Science".to_string());
        record.parent_course = Some("Computer Science".to_string());
        record.program_type = Some("Master's".to_string());
        record.credential = Some("MSc".to_string());
        record.location = Some("Toronto".to_string());
        record.country = Some("Canada".to_string());
        record.global_rank = Some(21);
        record.tuition_usd = Some(20000.0);
        record.university_type = Some("Public".to_string());

        assert_eq!(
            render_document(&record),
            "University: University of Toronto\n\
             Course: MSc Computer Science\n\
             Program: Computer Science\n\
             Parent Course: Computer Science\n\
             Level: Master's - MSc\n\
             Location: Toronto, Canada\n\
             Global Rank: 21\n\
             Tuition (USD): $20000\n\
             University Type: Public"
        );
    }

    #[test]
    fn test_render_missing_fields_as_placeholder() {
        let mut record = CourseRecord::new("2");
        record.tuition_usd = Some(12500.5);

        let text = render_document(&record);
        assert!(text.starts_with("University: N/A\nCourse: N/A"));
        assert!(text.contains("Level: N/A - N/A"));
        assert!(text.contains("Location: N/A, N/A"));
        assert!(text.contains("Global Rank: N/A"));
        assert!(text.contains("Tuition (USD): $12500.50"));
    }

    #[test]
    fn test_render_is_stable() {
        let record = CourseRecord::new("3");
        assert_eq!(render_document(&record), render_document(&record.clone()));
    }
}
