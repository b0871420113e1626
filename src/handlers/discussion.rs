// src/handlers/discussion.rs

use std::collections::HashMap;

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
    models::comment::{CommentNode, CommentRow, CreateCommentRequest},
    utils::jwt::Claims,
};

/// Builds the reply tree from flat rows. Rows arrive in creation order, so
/// children always follow their parents and siblings stay ordered.
fn build_tree(rows: Vec<CommentRow>) -> Vec<CommentNode> {
    let mut children: HashMap<i64, Vec<CommentRow>> = HashMap::new();
    let mut roots = Vec::new();

    for row in rows {
        match row.parent_id {
            Some(parent_id) => children.entry(parent_id).or_default().push(row),
            None => roots.push(row),
        }
    }

    fn attach(row: CommentRow, children: &mut HashMap<i64, Vec<CommentRow>>) -> CommentNode {
        let replies = children
            .remove(&row.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children))
            .collect();
        CommentNode {
            comment: row,
            replies,
        }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

/// Lists a lesson's comments as a reply tree.
pub async fn list_comments(
    State(pool): State<PgPool>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, CommentRow>(
        "SELECT c.id, c.lesson_id, c.user_id, u.username, c.content, c.parent_id, c.created_at
         FROM lesson_comments c
         JOIN users u ON c.user_id = u.id
         WHERE c.lesson_id = $1 AND c.deleted_at IS NULL
         ORDER BY c.created_at",
    )
    .bind(lesson_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list comments: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(build_tree(rows)))
}

/// Posts a comment (or a reply) on a lesson.
pub async fn create_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let lesson = sqlx::query_scalar::<_, i64>("SELECT id FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(&pool)
        .await?;

    if lesson.is_none() {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    // A reply must target a live comment on the same lesson.
    if let Some(parent_id) = payload.parent_id {
        let parent = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM lesson_comments
             WHERE id = $1 AND lesson_id = $2 AND deleted_at IS NULL",
        )
        .bind(parent_id)
        .bind(lesson_id)
        .fetch_optional(&pool)
        .await?;

        if parent.is_none() {
            return Err(AppError::BadRequest(
                "Parent comment not found on this lesson".to_string(),
            ));
        }
    }

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO lesson_comments (lesson_id, user_id, content, parent_id)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(lesson_id)
    .bind(claims.user_id())
    .bind(&payload.content)
    .bind(payload.parent_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create comment: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a comment and its whole reply subtree.
///
/// The subtree is collected by iterative BFS over parent_id, level by level,
/// then soft-deleted in one statement — no recursion.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = sqlx::query_scalar::<_, i64>(
        "SELECT user_id FROM lesson_comments WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != claims.user_id() && claims.role != "admin" {
        return Err(AppError::Forbidden(
            "Only the author or an admin may delete this comment".to_string(),
        ));
    }

    let mut to_delete = vec![id];
    let mut frontier = vec![id];

    while !frontier.is_empty() {
        let next = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM lesson_comments WHERE parent_id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&frontier)
        .fetch_all(&pool)
        .await?;

        to_delete.extend_from_slice(&next);
        frontier = next;
    }

    sqlx::query("UPDATE lesson_comments SET deleted_at = NOW() WHERE id = ANY($1)")
        .bind(&to_delete)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, parent_id: Option<i64>) -> CommentRow {
        CommentRow {
            id,
            lesson_id: 1,
            user_id: 1,
            username: "u".to_string(),
            content: format!("comment {}", id),
            parent_id,
            created_at: None,
        }
    }

    #[test]
    fn tree_groups_replies_under_parents() {
        let rows = vec![row(1, None), row(2, Some(1)), row(3, Some(1)), row(4, Some(2))];
        let tree = build_tree(rows);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies.len(), 2);
        assert_eq!(tree[0].replies[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].replies[0].comment.id, 4);
    }

    #[test]
    fn siblings_keep_arrival_order() {
        let rows = vec![row(1, None), row(2, None), row(3, Some(2))];
        let tree = build_tree(rows);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, 1);
        assert_eq!(tree[1].comment.id, 2);
        assert_eq!(tree[1].replies[0].comment.id, 3);
    }
}
