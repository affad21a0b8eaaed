//! Analytics API handlers

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap},
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::{ApiError, ApiResult, SuccessResponse};
use super::handlers::AppState;
use crate::analytics::{
    extract_client_ip, AnalyticsError, PostAnalytics, UserAnalytics, ViewReport, WindowDays,
};
use crate::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub device: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReadProgressParams {
    pub read_percentage: i64,
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    /// Window length in days (default: 30, range: 1-365)
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    i64::from(WindowDays::DEFAULT.get())
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Record a view of a post
pub async fn record_view(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(slug): Path<String>,
    Query(params): Query<ViewParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse>> {
    let post = state.post_by_slug(&slug).await?;
    let ip = extract_client_ip(&headers, addr.ip(), &state.analytics_config);

    state
        .analytics
        .record_view(ViewReport {
            post_id: post.id,
            user_id: viewer.map(|v| v.user_id),
            ip_address: ip.to_string(),
            user_agent: user_agent(&headers),
            referrer: params.referrer,
            country: params.country,
            device: params.device,
        })
        .await?;

    Ok(SuccessResponse::new("View recorded successfully"))
}

/// Attach a read percentage to the caller's latest view of a post
pub async fn record_read_progress(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(slug): Path<String>,
    Query(params): Query<ReadProgressParams>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<SuccessResponse>> {
    let read_percentage = u8::try_from(params.read_percentage)
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| {
            ApiError::BadRequest("read_percentage must be between 0 and 100".to_string())
        })?;

    let post = state.post_by_slug(&slug).await?;
    let ip = extract_client_ip(&headers, addr.ip(), &state.analytics_config);

    state
        .analytics
        .record_read_progress(
            post.id,
            viewer.map(|v| v.user_id),
            &ip.to_string(),
            read_percentage,
        )
        .await
        .map_err(|e| match e {
            AnalyticsError::NotFound => ApiError::NotFound("No view recorded for this post"),
            other => other.into(),
        })?;

    Ok(SuccessResponse::new("Read progress recorded successfully"))
}

/// Analytics for one post; only its author may read them
pub async fn post_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(slug): Path<String>,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<PostAnalytics>> {
    let window = WindowDays::try_from(params.days)?;
    let post = state.post_by_slug(&slug).await?;
    if post.author_id != user.user_id {
        return Err(ApiError::Forbidden(
            "You don't have permission to view these analytics",
        ));
    }

    let analytics = state.analytics.get_post_analytics(post.id, window).await?;
    Ok(Json(analytics))
}

/// Analytics across all posts of the caller
pub async fn user_analytics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<WindowParams>,
) -> ApiResult<Json<UserAnalytics>> {
    let window = WindowDays::try_from(params.days)?;
    let analytics = state
        .analytics
        .get_user_analytics(user.user_id, window)
        .await?;
    Ok(Json(analytics))
}
