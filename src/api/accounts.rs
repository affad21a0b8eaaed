//! Account API handlers: registration, login and the caller's profile

use anyhow::Context;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::info;

use super::error::{ApiError, ApiResult};
use super::handlers::AppState;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::models::{
    Credentials, LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest, User,
    UserComment,
};
use crate::storage::StorageError;

const BAD_LOGIN: &str = "Incorrect email or password";

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn token_response(state: &AppState, user: User) -> ApiResult<TokenResponse> {
    Ok(TokenResponse {
        access_token: state.auth.issue_token(user.id)?,
        token_type: "bearer",
        user,
    })
}

/// Create a password account and log it in
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let RegisterRequest { mut user, password } = payload;
    user.name = user.name.trim().to_string();
    user.email = user.email.trim().to_string();

    if user.name.is_empty() {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    if !is_valid_email(&user.email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if password.is_empty() {
        return Err(ApiError::BadRequest("Password cannot be empty".to_string()));
    }

    let hash = spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")?
        .context("failed to hash password")?;

    let created = state
        .storage
        .create_user_with_password(&user, &hash)
        .await
        .map_err(|e| match e {
            StorageError::Conflict => ApiError::BadRequest("Email already registered".to_string()),
            other => other.into(),
        })?;

    info!(user_id = created.id, "registered user");

    Ok((StatusCode::CREATED, Json(token_response(&state, created)?)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let credentials = state.storage.get_credentials(payload.email.trim()).await?;
    let Some(Credentials {
        user_id,
        password_hash: Some(hash),
    }) = credentials
    else {
        return Err(ApiError::Unauthorized(BAD_LOGIN));
    };

    let password = payload.password;
    let valid = spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("password verification task failed")?
        .context("failed to verify password")?;
    if !valid {
        return Err(ApiError::Unauthorized(BAD_LOGIN));
    }

    let user = state
        .storage
        .get_user(user_id)
        .await?
        .ok_or(ApiError::Unauthorized(BAD_LOGIN))?;

    Ok(Json(token_response(&state, user)?))
}

/// Partial update of the caller's name, bio and avatar
pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let name = payload.name.map(|n| n.trim().to_string());
    if name.as_deref().is_some_and(str::is_empty) {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }

    let changes = UpdateUserRequest { name, ..payload };
    state
        .storage
        .update_user(user.user_id, &changes)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User not found"))
}

/// The caller's comments, newest first, each with the post it belongs to
pub async fn current_user_comments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<UserComment>>> {
    Ok(Json(state.storage.list_comments_by_user(user.user_id).await?))
}
