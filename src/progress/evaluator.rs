// src/progress/evaluator.rs

use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        attempt::{
            ATTEMPT_FAILED, ATTEMPT_PASSED, AnswerRecord, QuizAttempt, SubmitQuizRequest,
            SubmittedAnswer,
        },
        quiz::{Question, Quiz},
    },
    progress::{aggregator, grade, ledger, scope},
};

/// The grading result of one submission, before persistence.
#[derive(Debug, PartialEq)]
pub struct ScoredSubmission {
    /// Points earned.
    pub score: f64,
    /// Sum of all question points, answered or not.
    pub total_points: f64,
    /// round(score / total_points * 100); 0 for a pointless quiz.
    pub percentage: i32,
    pub passed: bool,
    pub answers: Vec<AnswerRecord>,
}

/// Everything the submit endpoint returns: the recorded attempt plus the
/// lesson-quiz grade snapshot for the owning course.
#[derive(Debug, Serialize)]
pub struct SubmitOutcome {
    #[serde(rename = "score")]
    pub attempt: QuizAttempt,
    pub grade: String,
    pub average_score: Option<f64>,
}

/// Scores a submission against the quiz's questions.
///
/// Award rule: the submitted value must exactly match the stored
/// correct-answer string. Checkbox questions get no partial credit; whatever
/// representation the instructor stored is what a full-credit submission
/// must reproduce.
///
/// The pass check compares the unrounded score ratio against the threshold,
/// inclusively, so a submission landing exactly on the passing score passes.
/// The stored percentage is rounded separately.
pub fn score_submission(
    questions: &[Question],
    submitted: &[SubmittedAnswer],
    passing_score: i32,
) -> ScoredSubmission {
    let by_question: HashMap<i64, &str> = submitted
        .iter()
        .map(|a| (a.question_id, a.answer.as_str()))
        .collect();

    let mut score = 0.0;
    let mut total_points = 0.0;
    let mut answers = Vec::with_capacity(questions.len());

    for question in questions {
        total_points += question.points as f64;

        let submitted_value = by_question.get(&question.id).copied();
        let correct = submitted_value == Some(question.correct_answer.as_str());
        let points_earned = if correct { question.points as f64 } else { 0.0 };
        score += points_earned;

        answers.push(AnswerRecord {
            question_id: question.id,
            submitted: submitted_value.map(str::to_owned),
            correct,
            points_earned,
        });
    }

    let ratio = if total_points > 0.0 {
        score / total_points * 100.0
    } else {
        0.0
    };

    ScoredSubmission {
        score,
        total_points,
        percentage: ratio.round() as i32,
        passed: ratio >= passing_score as f64,
        answers,
    }
}

/// Handles one quiz submission end to end.
///
/// Preconditions are checked in order, each a distinct failure: the quiz must
/// exist and be published, then the attempt cap must not be reached. Only
/// after the attempt row is fully recorded do the downstream grade and
/// progress recomputes run; any earlier failure leaves no partial state.
pub async fn submit(
    pool: &PgPool,
    user_id: i64,
    quiz_id: i64,
    req: &SubmitQuizRequest,
) -> Result<SubmitOutcome, AppError> {
    let quiz = sqlx::query_as::<_, Quiz>(
        "SELECT id, title, course_id, module_id, lesson_id, time_limit, passing_score,
                attempts_allowed, randomize_questions, show_correct_answers, is_published,
                created_at
         FROM quizzes WHERE id = $1 AND is_published = TRUE",
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let used = ledger::count_attempts(pool, user_id, quiz_id).await?;
    if used >= quiz.attempts_allowed as i64 {
        return Err(AppError::AttemptsExhausted(
            "Maximum number of attempts reached".to_string(),
        ));
    }

    if req.answers.is_empty() {
        return Err(AppError::BadRequest("No answers submitted".to_string()));
    }

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, content, question_type, options, correct_answer, points, position
         FROM questions WHERE quiz_id = $1
         ORDER BY position",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    let scored = score_submission(&questions, &req.answers, quiz.passing_score);

    let mut new = ledger::NewAttempt {
        user_id,
        quiz_id,
        score: scored.score,
        total_points: scored.total_points,
        percentage: scored.percentage,
        attempt_number: (used + 1) as i32,
        answers: scored.answers,
        time_taken: req.time_taken.unwrap_or(0),
        status: if scored.passed {
            ATTEMPT_PASSED.to_string()
        } else {
            ATTEMPT_FAILED.to_string()
        },
    };

    // Two concurrent submissions can compute the same attempt number; the
    // ledger's uniqueness check rejects the loser. Retry exactly once with a
    // fresh count, then escalate.
    let attempt = match ledger::record_attempt(pool, &new).await {
        Ok(attempt) => attempt,
        Err(AppError::Conflict(_)) => {
            let recount = ledger::count_attempts(pool, user_id, quiz_id).await?;
            if recount >= quiz.attempts_allowed as i64 {
                return Err(AppError::AttemptsExhausted(
                    "Maximum number of attempts reached".to_string(),
                ));
            }
            new.attempt_number = (recount + 1) as i32;
            ledger::record_attempt(pool, &new).await.map_err(|e| match e {
                AppError::Conflict(msg) => AppError::InternalServerError(format!(
                    "attempt numbering did not converge: {msg}"
                )),
                other => other,
            })?
        }
        Err(e) => return Err(e),
    };

    // A fully-recorded attempt is what triggers the downstream recomputes.
    let Some(course_id) =
        scope::scope_course_id(pool, quiz.course_id, quiz.module_id, quiz.lesson_id).await?
    else {
        return Ok(SubmitOutcome {
            attempt,
            grade: aggregator::GRADE_INCOMPLETE.to_string(),
            average_score: None,
        });
    };

    let enrolled = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    .is_some();

    let grade_update = grade::lesson_quiz_grade(pool, user_id, course_id).await?;

    if enrolled {
        aggregator::recompute(pool, user_id, course_id).await?;
    } else {
        tracing::debug!(
            user_id,
            course_id,
            "attempt recorded without enrollment, skipping progress recompute"
        );
    }

    Ok(SubmitOutcome {
        attempt,
        grade: grade_update.grade,
        average_score: grade_update.average_score,
    })
}
