// src/progress/grade.rs

use serde::Serialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    progress::{aggregator::GRADE_INCOMPLETE, scope},
};

/// Outcome of the lesson-quiz grade pass, returned with every submission.
#[derive(Debug, Serialize, PartialEq)]
pub struct GradeUpdate {
    pub grade: String,
    pub average_score: Option<f64>,
}

impl GradeUpdate {
    fn incomplete() -> Self {
        GradeUpdate {
            grade: GRADE_INCOMPLETE.to_string(),
            average_score: None,
        }
    }
}

/// Latest-attempt raw score for one lesson-scoped quiz.
#[derive(Debug, sqlx::FromRow)]
struct LatestScore {
    score: f64,
    total_points: f64,
}

/// Letter band for a 0-10 average.
pub fn score_to_grade(average: f64) -> &'static str {
    if average >= 8.5 {
        "A"
    } else if average >= 7.0 {
        "B"
    } else if average >= 5.5 {
        "C"
    } else if average >= 4.0 {
        "D"
    } else {
        "F"
    }
}

/// Mean of latest raw scores re-expressed on a 0-10 scale.
/// None when nothing has been attempted yet.
fn average_out_of_ten(latest: &[LatestScore]) -> Option<f64> {
    if latest.is_empty() {
        return None;
    }

    let sum: f64 = latest
        .iter()
        .map(|s| {
            if s.total_points > 0.0 {
                s.score / s.total_points * 10.0
            } else {
                0.0
            }
        })
        .sum();

    Some(sum / latest.len() as f64)
}

/// The lesson-quiz letter grade: a derived metric distinct from the
/// enrollment's canonical completion grade (see DESIGN.md).
///
/// Considers only lesson-scoped, published quizzes of the course. For each,
/// the latest attempt BY SUBMISSION DATE contributes its raw score on a 0-10
/// scale; quizzes never attempted are left out of the average. With no
/// attempts at all the grade stays "Incomplete" and nothing is persisted —
/// this path never writes, the progress aggregator owns the enrollment row.
pub async fn lesson_quiz_grade(
    pool: &PgPool,
    user_id: i64,
    course_id: i64,
) -> Result<GradeUpdate, AppError> {
    let quizzes = scope::resolve_quiz_ids(pool, course_id, true).await?;
    if quizzes.lesson_level.is_empty() {
        return Ok(GradeUpdate::incomplete());
    }

    let latest = sqlx::query_as::<_, LatestScore>(
        "SELECT DISTINCT ON (quiz_id) score, total_points
         FROM quiz_attempts
         WHERE user_id = $1 AND quiz_id = ANY($2)
         ORDER BY quiz_id, submitted_at DESC",
    )
    .bind(user_id)
    .bind(&quizzes.lesson_level)
    .fetch_all(pool)
    .await?;

    match average_out_of_ten(&latest) {
        Some(average) => Ok(GradeUpdate {
            grade: score_to_grade(average).to_string(),
            average_score: Some(average),
        }),
        None => Ok(GradeUpdate::incomplete()),
    }
}
