// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{course::Course, user::User},
    utils::{hash::hash_password, jwt::Claims},
};

const USER_ROLES: [&str; 3] = ["learner", "instructor", "admin"];

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at
         FROM users
         ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    /// 'learner', 'instructor' or 'admin'.
    pub role: String,
}

/// Creates a new user with a specific role (e.g. instructor accounts).
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !USER_ROLES.contains(&payload.role.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unknown role '{}'",
            payload.role
        )));
    }

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password, role)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Check existence
    let _exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Perform updates sequentially if fields are present
    if let Some(new_username) = payload.username {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(new_username)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_role) = payload.role {
        if !USER_ROLES.contains(&new_role.as_str()) {
            return Err(AppError::BadRequest(format!("Unknown role '{}'", new_role)));
        }
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(new_role)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_password) = payload.password {
        let hashed = hash_password(&new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(hashed)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Prevent self-deletion
    if id == claims.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Courses awaiting moderation.
/// Admin only.
pub async fn list_pending_courses(
    State(pool): State<PgPool>,
) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT id, instructor_id, title, description, category, cover_img, status, created_at
         FROM courses
         WHERE status = 'pending'
         ORDER BY created_at",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(courses))
}

/// Sets a course's moderation state and bulk-flips publication on every
/// descendant quiz (course, module and lesson scope). The scope resolver
/// only counts published quizzes, so this is what makes a course's quizzes
/// start or stop counting toward learner progress.
async fn moderate_course(pool: &PgPool, course_id: i64, approve: bool) -> Result<(), AppError> {
    let status = if approve { "approved" } else { "rejected" };

    let mut tx = pool.begin().await?;

    let result = sqlx::query("UPDATE courses SET status = $1 WHERE id = $2")
        .bind(status)
        .bind(course_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    sqlx::query(
        "UPDATE quizzes SET is_published = $1
         WHERE course_id = $2
            OR module_id IN (SELECT id FROM course_modules WHERE course_id = $2)
            OR lesson_id IN (SELECT l.id FROM lessons l
                             JOIN course_modules m ON l.module_id = m.id
                             WHERE m.course_id = $2)",
    )
    .bind(approve)
    .bind(course_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(course_id, status, "course moderated");

    Ok(())
}

/// Approves a course and publishes its quizzes.
/// Admin only.
pub async fn approve_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    moderate_course(&pool, id, true).await?;
    Ok(StatusCode::OK)
}

/// Rejects a course and unpublishes its quizzes.
/// Admin only.
pub async fn reject_course(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    moderate_course(&pool, id, false).await?;
    Ok(StatusCode::OK)
}
