// src/handlers/course.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::course::{
        Course, CourseDetail, CourseModule, CourseSummary, CreateCourseRequest,
        CreateLessonRequest, CreateModuleRequest, Lesson, ModuleWithLessons,
    },
    progress::aggregator,
    utils::{html::clean_html, jwt::Claims},
};

/// Lists approved courses with derived enrollment counts.
/// Counts are computed at read time, never stored on the course row.
pub async fn list_courses(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, CourseSummary>(
        "SELECT c.id, c.instructor_id, c.title, c.description, c.category, c.cover_img,
                c.created_at,
                (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count
         FROM courses c
         WHERE c.status = 'approved'
         ORDER BY c.created_at DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}

/// Course detail: the course plus its ordered module/lesson tree.
/// Learners only see approved courses.
pub async fn get_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = sqlx::query_as::<_, Course>(
        "SELECT id, instructor_id, title, description, category, cover_img, status, created_at
         FROM courses
         WHERE id = $1 AND status = 'approved'",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let modules = sqlx::query_as::<_, CourseModule>(
        "SELECT id, course_id, title, position
         FROM course_modules
         WHERE course_id = $1
         ORDER BY position",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let lessons = sqlx::query_as::<_, Lesson>(
        "SELECT l.id, l.module_id, l.title, l.content, l.position
         FROM lessons l
         JOIN course_modules m ON l.module_id = m.id
         WHERE m.course_id = $1
         ORDER BY l.position",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let modules = modules
        .into_iter()
        .map(|m| {
            let module_lessons = lessons
                .iter()
                .filter(|l| l.module_id == m.id)
                .cloned()
                .collect();
            ModuleWithLessons {
                id: m.id,
                title: m.title,
                position: m.position,
                lessons: module_lessons,
            }
        })
        .collect();

    Ok(Json(CourseDetail { course, modules }))
}

/// Creates a new course owned by the calling instructor.
/// New courses start as 'pending' until an admin approves them.
pub async fn create_course(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO courses (instructor_id, title, description, category, cover_img)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(claims.user_id())
    .bind(&payload.title)
    .bind(clean_html(&payload.description))
    .bind(&payload.category)
    .bind(&payload.cover_img)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Fails unless the caller owns the course or is an admin.
async fn assert_course_owner(
    pool: &PgPool,
    course_id: i64,
    claims: &Claims,
) -> Result<(), AppError> {
    let instructor_id =
        sqlx::query_scalar::<_, i64>("SELECT instructor_id FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if instructor_id != claims.user_id() && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "Only the owning instructor may modify this course".to_string(),
        ));
    }

    Ok(())
}

/// Adds a module to a course. Positions are unique within the course.
pub async fn create_module(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    assert_course_owner(&pool, course_id, &claims).await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO course_modules (course_id, title, position)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(course_id)
    .bind(&payload.title)
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!(
                "Module position {} is already taken in this course",
                payload.position
            ))
        } else {
            tracing::error!("Failed to create module: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Adds a lesson to a module. The HTML body is sanitized before storage.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(module_id): Path<i64>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let course_id =
        sqlx::query_scalar::<_, i64>("SELECT course_id FROM course_modules WHERE id = $1")
            .bind(module_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Module not found".to_string()))?;

    assert_course_owner(&pool, course_id, &claims).await?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lessons (module_id, title, content, position)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(module_id)
    .bind(&payload.title)
    .bind(clean_html(&payload.content))
    .bind(payload.position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create lesson: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// The course a lesson belongs to, via its module.
async fn lesson_course_id(pool: &PgPool, lesson_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT m.course_id FROM lessons l
         JOIN course_modules m ON l.module_id = m.id
         WHERE l.id = $1",
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Lesson not found".to_string()))
}

/// Marks a lesson complete for the calling learner and recomputes the
/// enrollment. Marking twice is a no-op, not an error.
pub async fn complete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let course_id = lesson_course_id(&pool, lesson_id).await?;

    sqlx::query(
        "INSERT INTO lesson_completions (user_id, lesson_id)
         VALUES ($1, $2)
         ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(lesson_id)
    .execute(&pool)
    .await?;

    let enrollment = aggregator::recompute(&pool, user_id, course_id).await?;

    Ok(Json(enrollment))
}

/// Removes the learner's completion mark and recomputes the enrollment.
pub async fn uncomplete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();
    let course_id = lesson_course_id(&pool, lesson_id).await?;

    sqlx::query("DELETE FROM lesson_completions WHERE user_id = $1 AND lesson_id = $2")
        .bind(user_id)
        .bind(lesson_id)
        .execute(&pool)
        .await?;

    let enrollment = aggregator::recompute(&pool, user_id, course_id).await?;

    Ok(Json(enrollment))
}
