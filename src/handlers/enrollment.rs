// src/handlers/enrollment.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::enrollment::{EnrolledCourse, Enrollment},
    progress::aggregator,
    utils::jwt::Claims,
};

const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, progress, status, grade, enrolled_at, last_accessed";

/// Enrolls the calling user in an approved course.
/// One enrollment per (user, course); re-enrolling is a conflict.
pub async fn enroll(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let approved = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM courses WHERE id = $1 AND status = 'approved'",
    )
    .bind(course_id)
    .fetch_optional(&pool)
    .await?;

    if approved.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    sqlx::query("INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(course_id)
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict("Already enrolled in this course".to_string())
            } else {
                tracing::error!("Failed to enroll: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    // Establishes the invariant immediately: a trivial course reads as
    // complete from the moment of enrollment.
    let enrollment = aggregator::recompute(&pool, user_id, course_id).await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Removes the calling user's enrollment. The course's enrollment count is
/// derived at read time, so nothing else needs touching.
pub async fn unenroll(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM enrollments WHERE user_id = $1 AND course_id = $2")
        .bind(claims.user_id())
        .bind(course_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// The calling user's enrollment record for one course, as the frontend
/// renders it (progress bar, status, grade).
pub async fn my_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments
         WHERE user_id = $1 AND course_id = $2"
    ))
    .bind(claims.user_id())
    .bind(course_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    Ok(Json(enrollment))
}

/// Lists the calling user's enrollments with course titles.
pub async fn my_enrollments(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, EnrolledCourse>(
        "SELECT e.course_id, c.title, c.category, e.progress, e.status, e.grade, e.enrolled_at
         FROM enrollments e
         JOIN courses c ON e.course_id = c.id
         WHERE e.user_id = $1
         ORDER BY e.enrolled_at DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list enrollments: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}
