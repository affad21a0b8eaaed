//! Storage collaborator consumed by the analytics service

use async_trait::async_trait;

use crate::models::{Comment, Like, NewViewEvent, Post, ViewEvent};
use crate::storage::StorageResult;

/// Selects engagement records for a set of posts inside a time range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub post_ids: Vec<i64>,
    /// Inclusive lower bound (Unix seconds)
    pub start: i64,
    /// Inclusive upper bound (Unix seconds)
    pub end: i64,
}

impl EventFilter {
    pub fn for_post(post_id: i64, start: i64, end: i64) -> Self {
        Self {
            post_ids: vec![post_id],
            start,
            end,
        }
    }
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn find_post_by_id(&self, id: i64) -> StorageResult<Option<Post>>;

    /// Every post of the author, in insertion order, regardless of age
    async fn find_posts_by_author(&self, author_id: i64) -> StorageResult<Vec<Post>>;

    async fn find_view_events(&self, filter: &EventFilter) -> StorageResult<Vec<ViewEvent>>;

    async fn find_likes(&self, filter: &EventFilter) -> StorageResult<Vec<Like>>;

    async fn find_comments(&self, filter: &EventFilter) -> StorageResult<Vec<Comment>>;

    /// Append a view event and increment the post's live `views_count`
    async fn insert_view_event(&self, event: &NewViewEvent) -> StorageResult<ViewEvent>;

    /// Set `read_percentage` on the most recent view event matching the post and
    /// IP address (and user, when given). Returns false when nothing matched.
    async fn update_latest_read_percentage(
        &self,
        post_id: i64,
        user_id: Option<i64>,
        ip_address: &str,
        read_percentage: i64,
    ) -> StorageResult<bool>;
}
