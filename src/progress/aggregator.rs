// src/progress/aggregator.rs

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{attempt::ATTEMPT_PASSED, enrollment::Enrollment},
    progress::scope,
};

pub const GRADE_COMPLETE: &str = "Complete";
pub const GRADE_INCOMPLETE: &str = "Incomplete";

pub const STATUS_ENROLLED: &str = "enrolled";
pub const STATUS_COMPLETED: &str = "completed";

/// The user-facing state of one quiz: the latest attempt's percentage and
/// whether that attempt passed. Earlier attempts never count — the grade
/// reflects best recent state, not "ever passed".
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuizOutcome {
    pub quiz_id: i64,
    pub percentage: i32,
    pub status: String,
}

impl QuizOutcome {
    fn passed(&self) -> bool {
        self.status == ATTEMPT_PASSED
    }
}

/// round(completed / total * 100), clamped to 100.
/// A course with nothing completable counts as fully complete.
fn progress_percentage(total_completed: i64, total_items: i64) -> i32 {
    if total_items == 0 {
        return 100;
    }
    let pct = (total_completed as f64 / total_items as f64 * 100.0).round() as i32;
    pct.min(100)
}

/// Terminal grade for a fully-progressed course: the latest-attempt
/// percentages of passed quizzes, summed over ALL quizzes in the course
/// (every scope), divided by the total quiz count and expressed on a 0-10
/// scale with one decimal. A quiz whose latest attempt failed — or that was
/// never attempted — contributes 0 to the sum but still counts in the
/// denominator.
fn completion_grade(total_quizzes: usize, latest: &[QuizOutcome]) -> String {
    if total_quizzes == 0 {
        return GRADE_COMPLETE.to_string();
    }

    let passed_sum: i64 = latest
        .iter()
        .filter(|o| o.passed())
        .map(|o| o.percentage as i64)
        .sum();

    let average = passed_sum as f64 / total_quizzes as f64;
    format!("{:.1}", average / 10.0)
}

/// Latest attempt (highest attempt number) per quiz for this user, limited
/// to the given quiz ids. Quizzes without attempts are simply absent.
async fn latest_outcomes(
    pool: &PgPool,
    user_id: i64,
    quiz_ids: &[i64],
) -> Result<Vec<QuizOutcome>, AppError> {
    if quiz_ids.is_empty() {
        return Ok(Vec::new());
    }

    let outcomes = sqlx::query_as::<_, QuizOutcome>(
        "SELECT DISTINCT ON (quiz_id) quiz_id, percentage, status
         FROM quiz_attempts
         WHERE user_id = $1 AND quiz_id = ANY($2)
         ORDER BY quiz_id, attempt_number DESC",
    )
    .bind(user_id)
    .bind(quiz_ids)
    .fetch_all(pool)
    .await?;

    Ok(outcomes)
}

/// Recomputes progress, status and grade for one enrollment and persists the
/// result. Idempotent: with no intervening state change, calling it twice
/// yields the same row. Last-writer-wins; recomputes are triggered by the
/// learner's own actions, so collisions self-correct on the next trigger.
///
/// Completable items are lessons plus published module- and course-level
/// quizzes. Lesson-level quizzes are folded into their lesson's completion
/// unit and do not widen the denominator, but they DO count in the terminal
/// grade average.
pub async fn recompute(pool: &PgPool, user_id: i64, course_id: i64) -> Result<Enrollment, AppError> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    if exists.is_none() {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    let total_lessons = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM lessons l
         JOIN course_modules m ON l.module_id = m.id
         WHERE m.course_id = $1",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    let quizzes = scope::resolve_quiz_ids(pool, course_id, true).await?;

    let total_items =
        total_lessons + quizzes.course_level.len() as i64 + quizzes.module_level.len() as i64;

    let (progress, status, grade) = if total_items == 0 {
        // Trivial course: nothing to complete.
        (100, STATUS_COMPLETED, GRADE_COMPLETE.to_string())
    } else {
        let completed_lessons = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lesson_completions lc
             JOIN lessons l ON lc.lesson_id = l.id
             JOIN course_modules m ON l.module_id = m.id
             WHERE m.course_id = $1 AND lc.user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let mut countable = quizzes.course_level.clone();
        countable.extend_from_slice(&quizzes.module_level);
        let completed_quizzes = latest_outcomes(pool, user_id, &countable)
            .await?
            .iter()
            .filter(|o| o.passed())
            .count() as i64;

        let progress = progress_percentage(completed_lessons + completed_quizzes, total_items);

        if progress >= 100 {
            let all_ids = quizzes.all();
            let outcomes = latest_outcomes(pool, user_id, &all_ids).await?;
            (
                100,
                STATUS_COMPLETED,
                completion_grade(all_ids.len(), &outcomes),
            )
        } else {
            (progress, STATUS_ENROLLED, GRADE_INCOMPLETE.to_string())
        }
    };

    let enrollment = sqlx::query_as::<_, Enrollment>(
        "UPDATE enrollments
         SET progress = $3, status = $4, grade = $5, last_accessed = NOW()
         WHERE user_id = $1 AND course_id = $2
         RETURNING id, user_id, course_id, progress, status, grade, enrolled_at, last_accessed",
    )
    .bind(user_id)
    .bind(course_id)
    .bind(progress)
    .bind(status)
    .bind(&grade)
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        user_id,
        course_id,
        progress = enrollment.progress,
        grade = %enrollment.grade,
        "progress recomputed"
    );

    Ok(enrollment)
}
