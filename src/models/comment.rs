// src/models/comment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'lesson_comments' table in the database.
/// Rows are flat; the reply tree is reconstructed on read via `parent_id`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LessonComment {
    pub id: i64,
    pub lesson_id: i64,
    pub user_id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,
}

/// Flat comment row joined with the author name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub lesson_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub parent_id: Option<i64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A comment with its replies, grouped on read.
#[derive(Debug, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentRow,
    pub replies: Vec<CommentNode>,
}
