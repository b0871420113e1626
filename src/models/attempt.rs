// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use utoipa::ToSchema;

pub const ATTEMPT_PASSED: &str = "passed";
pub const ATTEMPT_FAILED: &str = "failed";

/// Represents the 'quiz_attempts' table: one row per submission.
///
/// `(user_id, quiz_id, attempt_number)` is unique; attempt numbers are dense
/// 1-based per user+quiz. Scores are kept on the canonical raw-points /
/// 0-100-percentage scale; 0-10 values exist only at response boundaries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,

    /// Points earned.
    pub score: f64,

    /// Sum of all question points.
    pub total_points: f64,

    /// round(score / total_points * 100), 0 when the quiz has no points.
    pub percentage: i32,

    /// 1-based, per user+quiz.
    pub attempt_number: i32,

    /// Per-question grading record.
    pub answers: Json<Vec<AnswerRecord>>,

    /// Seconds the learner spent, self-reported.
    pub time_taken: i32,

    /// 'passed', 'failed' or 'incomplete'.
    pub status: String,

    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One graded question inside an attempt's `answers` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecord {
    pub question_id: i64,
    /// What the learner submitted; None when the question was left blank.
    pub submitted: Option<String>,
    pub correct: bool,
    pub points_earned: f64,
}

/// One answer in a submission payload.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: String,
}

/// DTO for submitting a quiz attempt. The user comes from the verified
/// token, the quiz from the path.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitQuizRequest {
    pub answers: Vec<SubmittedAnswer>,
    /// Seconds spent, optional.
    pub time_taken: Option<i32>,
}

/// Attempt-budget summary for the score-status endpoint.
#[derive(Debug, Serialize)]
pub struct AttemptsInfo {
    pub used: i64,
    pub remaining: i64,
    pub can_retake: bool,
}
