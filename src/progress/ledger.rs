// src/progress/ledger.rs

use sqlx::{PgPool, types::Json};

use crate::{
    error::AppError,
    models::attempt::{AnswerRecord, QuizAttempt},
};

const ATTEMPT_COLUMNS: &str = "id, user_id, quiz_id, score, total_points, percentage, \
     attempt_number, answers, time_taken, status, submitted_at";

/// A graded attempt ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: i64,
    pub quiz_id: i64,
    pub score: f64,
    pub total_points: f64,
    pub percentage: i32,
    pub attempt_number: i32,
    pub answers: Vec<AnswerRecord>,
    pub time_taken: i32,
    pub status: String,
}

/// Total submissions so far for this user and quiz.
pub async fn count_attempts(pool: &PgPool, user_id: i64, quiz_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
    )
    .bind(user_id)
    .bind(quiz_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// The attempt with the highest attempt number, if any.
pub async fn latest_attempt(
    pool: &PgPool,
    user_id: i64,
    quiz_id: i64,
) -> Result<Option<QuizAttempt>, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts
         WHERE user_id = $1 AND quiz_id = $2
         ORDER BY attempt_number DESC
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?;

    Ok(attempt)
}

/// Persists a new attempt row.
///
/// `(user_id, quiz_id, attempt_number)` uniqueness is checked here before the
/// insert so the condition surfaces as a typed `Conflict`, and again by the
/// database unique index, which catches the race between two concurrent
/// submissions computing the same attempt number. Callers treat the conflict
/// as retryable: recompute the attempt number and resubmit once.
///
/// Recording an attempt performs no downstream writes; the submission
/// evaluator owns triggering grade and progress recomputes.
pub async fn record_attempt(pool: &PgPool, new: &NewAttempt) -> Result<QuizAttempt, AppError> {
    let exists = sqlx::query_scalar::<_, i32>(
        "SELECT 1 FROM quiz_attempts
         WHERE user_id = $1 AND quiz_id = $2 AND attempt_number = $3",
    )
    .bind(new.user_id)
    .bind(new.quiz_id)
    .bind(new.attempt_number)
    .fetch_optional(pool)
    .await?;

    if exists.is_some() {
        return Err(AppError::Conflict(format!(
            "Attempt {} already recorded for this quiz",
            new.attempt_number
        )));
    }

    let attempt = sqlx::query_as::<_, QuizAttempt>(&format!(
        "INSERT INTO quiz_attempts
         (user_id, quiz_id, score, total_points, percentage, attempt_number,
          answers, time_taken, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(new.user_id)
    .bind(new.quiz_id)
    .bind(new.score)
    .bind(new.total_points)
    .bind(new.percentage)
    .bind(new.attempt_number)
    .bind(Json(&new.answers))
    .bind(new.time_taken)
    .bind(&new.status)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!(
                "Attempt {} already recorded for this quiz",
                new.attempt_number
            ))
        } else {
            tracing::error!("Failed to record attempt: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok(attempt)
}
