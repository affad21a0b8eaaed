use crate::models::{
    Category, Comment, CreatePostRequest, Credentials, LikeOutcome, NewUser, Post, PostFilter,
    UpdatePostRequest, UpdateUserRequest, User, UserComment,
};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);
        if unique_violation {
            StorageError::Conflict
        } else {
            StorageError::Other(err.into())
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Resolved changes applied by [`Storage::update_post`]
#[derive(Debug, Clone, Copy)]
pub struct PostChanges<'a> {
    pub request: &'a UpdatePostRequest,
    /// New slug, present only when the title changed
    pub slug: Option<&'a str>,
    /// Set on the first transition to published
    pub published_at: Option<i64>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    async fn create_user(&self, user: &NewUser) -> StorageResult<User>;

    /// Insert a user that can log in. `password_hash` is an Argon2 PHC string.
    async fn create_user_with_password(
        &self,
        user: &NewUser,
        password_hash: &str,
    ) -> StorageResult<User>;

    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    async fn get_credentials(&self, email: &str) -> Result<Option<Credentials>>;

    /// Apply a partial profile update. `None` when the user does not exist.
    async fn update_user(&self, id: i64, changes: &UpdateUserRequest) -> Result<Option<User>>;

    async fn create_category(&self, name: &str, slug: &str) -> StorageResult<Category>;

    async fn get_category(&self, id: i64) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Whether a post other than `exclude_id` already owns `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Insert a post under an already resolved slug. Returns `Conflict` when the
    /// slug was taken concurrently.
    async fn create_post(
        &self,
        author_id: i64,
        request: &CreatePostRequest,
        slug: &str,
    ) -> StorageResult<Post>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>>;

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    async fn update_post(&self, id: i64, changes: PostChanges<'_>) -> StorageResult<Post>;

    /// Delete a post together with its tags, likes, comments and view events
    async fn delete_post(&self, id: i64) -> Result<bool>;

    async fn get_tags(&self, post_id: i64) -> Result<Vec<String>>;

    /// Published posts matching the filter, at most `filter.limit` rows
    async fn list_published_posts(&self, filter: &PostFilter) -> Result<Vec<Post>>;

    /// All posts of an author, newest first
    async fn list_posts_by_author(&self, author_id: i64) -> Result<Vec<Post>>;

    /// Posts liked by a user, most recent like first
    async fn list_liked_posts(&self, user_id: i64) -> Result<Vec<Post>>;

    async fn has_liked(&self, post_id: i64, user_id: i64) -> Result<bool>;

    /// Like the post, or remove the existing like, keeping `likes_count` in step
    async fn toggle_like(&self, post_id: i64, user_id: i64) -> StorageResult<LikeOutcome>;

    /// Insert a comment and bump the post's `comments_count`
    async fn create_comment(
        &self,
        post_id: i64,
        user_id: i64,
        content: &str,
    ) -> StorageResult<Comment>;

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of a post, oldest first
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>>;

    /// Comments written by a user together with their posts, newest first
    async fn list_comments_by_user(&self, user_id: i64) -> Result<Vec<UserComment>>;

    async fn update_comment(&self, id: i64, content: &str) -> Result<Option<Comment>>;

    /// Delete a comment and decrement the post's `comments_count`
    async fn delete_comment(&self, id: i64) -> Result<bool>;
}
