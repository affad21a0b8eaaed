//! Engagement records: views, likes and comments

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::User;

/// A single recorded page view
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ViewEvent {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
    /// Set at most once by a read-progress report
    pub read_percentage: Option<i64>,
    pub created_at: i64,
}

/// View event as submitted, before it is assigned an id
#[derive(Debug, Clone)]
pub struct NewViewEvent {
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub user_agent: String,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Like {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: i64,
}

/// Result of toggling a like
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: Option<User>,
}

/// Post a comment belongs to, as listed with the commenter's own comments
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserComment {
    pub id: i64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub post: PostSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub post_id: i64,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}
