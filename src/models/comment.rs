use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,
}

/// DTO for displaying a comment with author info. Deleted placeholders
/// carry no author and `[deleted]` as content.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub content: String,
    pub is_deleted: bool,
    pub root_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A reply belongs to the thread of its parent: the parent's root, or the
/// parent itself when the parent is a top-level comment.
pub fn thread_root(parent_id: i64, parent_root: Option<i64>) -> i64 {
    parent_root.unwrap_or(parent_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_inherit_the_thread_root() {
        assert_eq!(thread_root(10, None), 10);
        assert_eq!(thread_root(12, Some(10)), 10);
    }
}
