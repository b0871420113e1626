// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,

    pub instructor_id: i64,

    pub title: String,

    /// Sanitized HTML description.
    pub description: String,

    /// Free-form category (e.g., "programming", "mathematics").
    pub category: String,

    /// Optional URL to the course cover image.
    pub cover_img: Option<String>,

    /// Moderation state: 'pending', 'approved' or 'rejected'.
    /// Only approved courses are visible to learners, and quiz publication
    /// follows this state.
    pub status: String,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'course_modules' table. Ordered sections of a course.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    /// Unique within the course.
    pub position: i32,
}

/// Represents the 'lessons' table. Ordered within a module.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    /// Sanitized HTML body.
    pub content: String,
    pub position: i32,
}

/// Course row plus read-time aggregates for listings.
/// Enrollment counts are derived with COUNT(*), never stored.
#[derive(Debug, Serialize, FromRow)]
pub struct CourseSummary {
    pub id: i64,
    pub instructor_id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub cover_img: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub enrollment_count: i64,
}

/// A module with its lessons, for the course detail view.
#[derive(Debug, Serialize)]
pub struct ModuleWithLessons {
    pub id: i64,
    pub title: String,
    pub position: i32,
    pub lessons: Vec<Lesson>,
}

/// Full course detail: the course plus its ordered module/lesson tree.
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub modules: Vec<ModuleWithLessons>,
}

/// DTO for creating a new course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub description: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub cover_img: Option<String>,
}

/// DTO for adding a module to a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateModuleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 0))]
    pub position: i32,
}

/// DTO for adding a lesson to a module.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100000))]
    pub content: String,
    #[validate(range(min = 0))]
    pub position: i32,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_img_must_be_a_url() {
        let req = CreateCourseRequest {
            title: "Intro to Rust".to_string(),
            description: String::new(),
            category: "programming".to_string(),
            cover_img: Some("not a url".to_string()),
        };
        assert!(req.validate().is_err());

        let req = CreateCourseRequest {
            cover_img: Some("https://example.com/cover.png".to_string()),
            ..req
        };
        assert!(req.validate().is_ok());
    }
}
