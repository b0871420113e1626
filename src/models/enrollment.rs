// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'enrollments' table: one row per (user, course).
///
/// `progress`, `status` and `grade` are owned by the progress aggregator;
/// clients never supply them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,

    /// 0-100, last value computed by the aggregator.
    pub progress: i32,

    /// 'enrolled', 'completed' or 'dropped'. 'completed' iff progress is 100.
    pub status: String,

    /// "Incomplete", "Complete", or a 0.0-10.0 average formatted with one
    /// decimal (e.g. "8.7").
    pub grade: String,

    pub enrolled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_accessed: Option<chrono::DateTime<chrono::Utc>>,
}

/// Joined row for the "my courses" listing.
#[derive(Debug, Serialize, FromRow)]
pub struct EnrolledCourse {
    pub course_id: i64,
    pub title: String,
    pub category: String,
    pub progress: i32,
    pub status: String,
    pub grade: String,
    pub enrolled_at: Option<chrono::DateTime<chrono::Utc>>,
}
