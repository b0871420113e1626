// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{ATTEMPT_PASSED, AttemptsInfo, SubmitQuizRequest},
        quiz::{CreateQuizRequest, PublicQuestion, Question, Quiz, QuizView, UpdateQuizRequest},
    },
    progress::{evaluator, ledger, scope},
    utils::jwt::Claims,
};

const QUIZ_COLUMNS: &str = "id, title, course_id, module_id, lesson_id, time_limit, \
     passing_score, attempts_allowed, randomize_questions, show_correct_answers, \
     is_published, created_at";

async fn fetch_published_quiz(pool: &PgPool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1 AND is_published = TRUE"
    ))
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))
}

/// Returns a quiz with its questions, correct answers stripped.
/// Question order is randomized when the quiz asks for it.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_published_quiz(&pool, id).await?;

    let order = if quiz.randomize_questions {
        "RANDOM()"
    } else {
        "position"
    };

    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT id, quiz_id, content, question_type, options, correct_answer, points, position
         FROM questions WHERE quiz_id = $1
         ORDER BY {order}"
    ))
    .bind(id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch quiz questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(QuizView {
        id: quiz.id,
        title: quiz.title,
        time_limit: quiz.time_limit,
        passing_score: quiz.passing_score,
        attempts_allowed: quiz.attempts_allowed,
        questions: questions.into_iter().map(PublicQuestion::from).collect(),
    }))
}

/// Creates a quiz with its questions, attached to exactly one scope.
/// Publication follows the owning course's moderation state.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course_id = scope::scope_course_id(
        &pool,
        payload.course_id,
        payload.module_id,
        payload.lesson_id,
    )
    .await?
    .ok_or(AppError::NotFound(
        "Quiz scope target not found".to_string(),
    ))?;

    let course = sqlx::query_as::<_, (i64, String)>(
        "SELECT instructor_id, status FROM courses WHERE id = $1",
    )
    .bind(course_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if course.0 != claims.user_id() && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "Only the owning instructor may add quizzes to this course".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let quiz_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO quizzes
         (title, course_id, module_id, lesson_id, time_limit, passing_score,
          attempts_allowed, randomize_questions, show_correct_answers, is_published)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING id",
    )
    .bind(&payload.title)
    .bind(payload.course_id)
    .bind(payload.module_id)
    .bind(payload.lesson_id)
    .bind(payload.time_limit.unwrap_or(0))
    .bind(payload.passing_score)
    .bind(payload.attempts_allowed)
    .bind(payload.randomize_questions.unwrap_or(false))
    .bind(payload.show_correct_answers.unwrap_or(false))
    .bind(course.1 == "approved")
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for question in &payload.questions {
        sqlx::query(
            "INSERT INTO questions
             (quiz_id, content, question_type, options, correct_answer, points, position)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(quiz_id)
        .bind(&question.content)
        .bind(&question.question_type)
        .bind(sqlx::types::Json(&question.options))
        .bind(&question.correct_answer)
        .bind(question.points)
        .bind(question.position)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": quiz_id}))))
}

/// Updates quiz configuration. Fields are optional; scope refs are fixed at
/// creation.
pub async fn update_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let course_id = scope::scope_course_id(&pool, quiz.course_id, quiz.module_id, quiz.lesson_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let instructor_id =
        sqlx::query_scalar::<_, i64>("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if instructor_id != claims.user_id() && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "Only the owning instructor may modify this quiz".to_string(),
        ));
    }

    if payload.title.is_none()
        && payload.time_limit.is_none()
        && payload.passing_score.is_none()
        && payload.attempts_allowed.is_none()
        && payload.randomize_questions.is_none()
        && payload.show_correct_answers.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(time_limit) = payload.time_limit {
        separated.push("time_limit = ");
        separated.push_bind_unseparated(time_limit);
    }

    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(attempts_allowed) = payload.attempts_allowed {
        separated.push("attempts_allowed = ");
        separated.push_bind_unseparated(attempts_allowed);
    }

    if let Some(randomize) = payload.randomize_questions {
        separated.push("randomize_questions = ");
        separated.push_bind_unseparated(randomize);
    }

    if let Some(show) = payload.show_correct_answers {
        separated.push("show_correct_answers = ");
        separated.push_bind_unseparated(show);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Submits a quiz attempt for the calling learner.
///
/// Scores the answers, records the attempt, then recomputes the lesson-quiz
/// grade and course progress for the owning enrollment.
pub async fn submit_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = evaluator::submit(&pool, claims.user_id(), id, &payload).await?;

    Ok(Json(outcome))
}

/// The calling learner's standing on a quiz: latest attempt and remaining
/// attempt budget, for the "retake?" UI.
pub async fn quiz_score(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let quiz = fetch_published_quiz(&pool, id).await?;

    let used = ledger::count_attempts(&pool, user_id, id).await?;
    let latest = ledger::latest_attempt(&pool, user_id, id).await?;

    let has_completed = latest
        .as_ref()
        .map(|a| a.status == ATTEMPT_PASSED)
        .unwrap_or(false);
    let remaining = (quiz.attempts_allowed as i64 - used).max(0);

    Ok(Json(serde_json::json!({
        "has_completed": has_completed,
        "latest_score": latest,
        "attempts": AttemptsInfo {
            used,
            remaining,
            can_retake: remaining > 0,
        },
        "quiz": {
            "id": quiz.id,
            "title": quiz.title,
            "passing_score": quiz.passing_score,
            "attempts_allowed": quiz.attempts_allowed,
            "time_limit": quiz.time_limit,
        },
    })))
}
