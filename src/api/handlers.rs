use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ApiResult, SuccessResponse};
use crate::analytics::AnalyticsService;
use crate::auth::{AuthService, AuthUser};
use crate::config::AnalyticsConfig;
use crate::cursor::{CursorData, CursorSigner};
use crate::models::{
    Category, CommentResponse, CreateCommentRequest, CreatePostRequest, LikeOutcome,
    ListPostsQuery, Post, PostFilter, PostPage, PostResponse, UpdateCommentRequest,
    UpdatePostRequest, User,
};
use crate::slug::{create_post_with_unique_slug, resolve_unique_slug};
use crate::storage::{PostChanges, Storage, StorageError};

/// Upper bound for `limit` on post listings
pub const MAX_PAGE_SIZE: i64 = 100;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub analytics: Arc<AnalyticsService>,
    pub auth: Arc<AuthService>,
    pub cursors: CursorSigner,
    pub analytics_config: AnalyticsConfig,
    /// Base of public post links, without a trailing `/`
    pub frontend_url: String,
}

impl AppState {
    pub(super) async fn post_by_slug(&self, slug: &str) -> ApiResult<Post> {
        self.storage
            .get_post_by_slug(slug)
            .await?
            .ok_or(ApiError::NotFound("Blog post not found"))
    }

    async fn post_by_id(&self, id: i64) -> ApiResult<Post> {
        self.storage
            .get_post(id)
            .await?
            .ok_or(ApiError::NotFound("Blog post not found"))
    }

    async fn ensure_category(&self, category_id: i64) -> ApiResult<()> {
        match self.storage.get_category(category_id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::BadRequest("Category not found".to_string())),
        }
    }

    async fn render_post(&self, post: Post, viewer: Option<AuthUser>) -> ApiResult<PostResponse> {
        let tags = self.storage.get_tags(post.id).await?;
        let author = self.storage.get_user(post.author_id).await?;
        let category = self.storage.get_category(post.category_id).await?;
        let is_liked = match viewer {
            Some(user) => self.storage.has_liked(post.id, user.user_id).await?,
            None => false,
        };
        let url = format!("{}/blog/{}", self.frontend_url, post.slug);

        Ok(PostResponse {
            post,
            url,
            tags,
            author,
            category,
            is_liked,
        })
    }

    async fn render_posts(
        &self,
        posts: Vec<Post>,
        viewer: Option<AuthUser>,
    ) -> ApiResult<Vec<PostResponse>> {
        let mut rendered = Vec::with_capacity(posts.len());
        for post in posts {
            rendered.push(self.render_post(post, viewer).await?);
        }
        Ok(rendered)
    }
}

/// List published posts, newest first by default
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Json<PostPage>> {
    if !(1..=MAX_PAGE_SIZE).contains(&query.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let after = match query.cursor.as_deref() {
        Some(cursor) => {
            let data = state
                .cursors
                .verify(cursor)
                .map_err(|_| ApiError::BadRequest("Invalid cursor".to_string()))?;
            Some((data.published_at, data.id))
        }
        None => None,
    };

    let filter = PostFilter {
        search: query.search,
        category_slug: query.category,
        tag: query.tag,
        sort: query.sort,
        // One extra row tells whether another page exists
        limit: query.limit + 1,
        after,
    };

    let mut posts = state.storage.list_published_posts(&filter).await?;
    let has_more = posts.len() as i64 > query.limit;
    posts.truncate(query.limit as usize);

    let next_cursor = match posts.last() {
        Some(last) if has_more => Some(state.cursors.sign(&CursorData {
            published_at: last.published_at.unwrap_or(last.created_at),
            id: last.id,
        })?),
        _ => None,
    };

    Ok(Json(PostPage {
        posts: state.render_posts(posts, viewer).await?,
        next_cursor,
    }))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }
    state.ensure_category(payload.category_id).await?;

    let post = create_post_with_unique_slug(state.storage.as_ref(), user.user_id, &payload)
        .await
        .map_err(|e| match e {
            StorageError::Conflict => ApiError::Conflict("Could not allocate a unique slug"),
            other => other.into(),
        })?;

    info!(post_id = post.id, slug = %post.slug, author_id = user.user_id, "created post");

    let rendered = state.render_post(post, Some(user)).await?;
    Ok((StatusCode::CREATED, Json(rendered)))
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PostResponse>> {
    let post = state.post_by_slug(&slug).await?;
    Ok(Json(state.render_post(post, viewer).await?))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostResponse>> {
    let post = state.post_by_id(id).await?;
    if post.author_id != user.user_id {
        return Err(ApiError::Forbidden("You don't have permission to update this post"));
    }

    if let Some(category_id) = payload.category_id {
        state.ensure_category(category_id).await?;
    }

    let slug = match payload.title.as_deref() {
        Some(title) if title.trim().is_empty() => {
            return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
        }
        Some(title) if title != post.title => {
            Some(resolve_unique_slug(state.storage.as_ref(), title, Some(id)).await?)
        }
        _ => None,
    };

    let published_at = match (payload.published, post.published_at) {
        (Some(true), None) => Some(chrono::Utc::now().timestamp()),
        _ => None,
    };

    let updated = state
        .storage
        .update_post(
            id,
            PostChanges {
                request: &payload,
                slug: slug.as_deref(),
                published_at,
            },
        )
        .await?;

    info!(post_id = id, slug = %updated.slug, "updated post");

    Ok(Json(state.render_post(updated, Some(user)).await?))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    let post = state.post_by_id(id).await?;
    if post.author_id != user.user_id {
        return Err(ApiError::Forbidden("You don't have permission to delete this post"));
    }

    if !state.storage.delete_post(id).await? {
        return Err(ApiError::NotFound("Blog post not found"));
    }
    info!(post_id = id, "deleted post");

    Ok(SuccessResponse::new("Blog post deleted successfully"))
}

/// Like the post, or remove the caller's like
pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> ApiResult<Json<LikeOutcome>> {
    let post = state.post_by_slug(&slug).await?;
    let outcome = state.storage.toggle_like(post.id, user.user_id).await?;
    Ok(Json(outcome))
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(state.storage.list_categories().await?))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<CommentResponse>>> {
    let post = state.post_by_slug(&slug).await?;
    let comments = state.storage.list_comments(post.id).await?;

    let mut users: HashMap<i64, Option<User>> = HashMap::new();
    let mut rendered = Vec::with_capacity(comments.len());
    for comment in comments {
        let user = match users.get(&comment.user_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = state.storage.get_user(comment.user_id).await?;
                users.insert(comment.user_id, fetched.clone());
                fetched
            }
        };
        rendered.push(CommentResponse { comment, user });
    }

    Ok(Json(rendered))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }

    let comment = state
        .storage
        .create_comment(payload.post_id, user.user_id, content)
        .await
        .map_err(|e| match e {
            StorageError::NotFound => ApiError::NotFound("Blog post not found"),
            other => other.into(),
        })?;

    let author = state.storage.get_user(user.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            comment,
            user: author,
        }),
    ))
}

pub async fn update_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> ApiResult<Json<CommentResponse>> {
    let existing = state
        .storage
        .get_comment(id)
        .await?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    if existing.user_id != user.user_id {
        return Err(ApiError::Forbidden("You don't have permission to update this comment"));
    }

    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }

    let comment = state
        .storage
        .update_comment(id, content)
        .await?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    let author = state.storage.get_user(user.user_id).await?;

    Ok(Json(CommentResponse {
        comment,
        user: author,
    }))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse>> {
    let existing = state
        .storage
        .get_comment(id)
        .await?
        .ok_or(ApiError::NotFound("Comment not found"))?;
    if existing.user_id != user.user_id {
        return Err(ApiError::Forbidden("You don't have permission to delete this comment"));
    }

    if !state.storage.delete_comment(id).await? {
        return Err(ApiError::NotFound("Comment not found"));
    }

    Ok(SuccessResponse::new("Comment deleted successfully"))
}

pub async fn current_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<User>> {
    state
        .storage
        .get_user(user.user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User not found"))
}

/// Posts the caller liked, most recent like first
pub async fn liked_posts(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<PostResponse>>> {
    let posts = state.storage.list_liked_posts(user.user_id).await?;
    Ok(Json(state.render_posts(posts, Some(user)).await?))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    state
        .storage
        .get_user(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User not found"))
}

/// An author's posts; drafts are only listed for the author themselves
pub async fn user_posts(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<PostResponse>>> {
    if state.storage.get_user(id).await?.is_none() {
        return Err(ApiError::NotFound("User not found"));
    }

    let is_self = viewer.is_some_and(|v| v.user_id == id);
    let posts = state
        .storage
        .list_posts_by_author(id)
        .await?
        .into_iter()
        .filter(|p| is_self || p.published)
        .collect();

    Ok(Json(state.render_posts(posts, viewer).await?))
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    SuccessResponse::new("OK")
}
