mod course;
mod recommendation;
mod user_preferences;

pub use course::{CourseMetadata, CourseRecord};
pub use recommendation::Recommendation;
pub use user_preferences::UserPreferences;
