use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::{Category, User};

/// A blog post as stored. Tags live in their own table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub category_id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Post as rendered to API clients
#[derive(Debug, Clone, Serialize)]
pub struct PostResponse {
    #[serde(flatten)]
    pub post: Post,
    /// Absolute link to the post on the frontend
    pub url: String,
    pub tags: Vec<String>,
    pub author: Option<User>,
    pub category: Option<Category>,
    pub is_liked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category_id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category_id: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub cover_image: Option<String>,
    pub published: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListPostsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub cursor: Option<String>,
}

fn default_limit() -> i64 {
    10
}

/// Storage-level filter for published post listings
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub search: Option<String>,
    pub category_slug: Option<String>,
    pub tag: Option<String>,
    pub sort: SortOrder,
    pub limit: i64,
    /// Keyset position `(published_at, id)` of the last post already returned
    pub after: Option<(i64, i64)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostResponse>,
    pub next_cursor: Option<String>,
}
