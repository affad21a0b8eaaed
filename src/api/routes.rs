use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::{self, Next},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::analytics::AnalyticsService;
use crate::auth::{auth_middleware, AuthService};
use crate::config::{AuthMode, Config};
use crate::cursor::CursorSigner;
use crate::storage::Storage;

use super::accounts::{current_user_comments, login, register, update_current_user};
use super::analytics::{post_analytics, record_read_progress, record_view, user_analytics};
use super::handlers::{
    create_comment, create_post, current_user, delete_comment, delete_post, get_post, get_user,
    health_check, liked_posts, list_categories, list_comments, list_posts, toggle_like,
    update_comment, update_post, user_posts, AppState,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed)
    }
}

pub fn create_api_router(
    storage: Arc<dyn Storage>,
    analytics: Arc<AnalyticsService>,
    auth_service: Arc<AuthService>,
    config: &Config,
) -> Router {
    let state = Arc::new(AppState {
        storage,
        analytics,
        auth: Arc::clone(&auth_service),
        cursors: CursorSigner::new(config.pagination.cursor_hmac_secret.as_deref()),
        analytics_config: config.analytics.clone(),
        frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
    });

    // `{post}` is a slug for reads and a numeric id for writes
    let mut api = Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{post}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{post}/like", post(toggle_like))
        .route("/posts/{post}/comments", get(list_comments))
        .route("/categories", get(list_categories))
        .route("/comments", post(create_comment))
        .route("/comments/{id}", put(update_comment).delete(delete_comment))
        .route("/users/me", get(current_user).put(update_current_user))
        .route("/users/me/likes", get(liked_posts))
        .route("/users/me/comments", get(current_user_comments))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/posts", get(user_posts))
        .route("/analytics/view/{slug}", post(record_view))
        .route("/analytics/read-progress/{slug}", post(record_read_progress))
        .route("/analytics/posts/{slug}", get(post_analytics))
        .route("/analytics/user", get(user_analytics));

    // Password accounts are only offered when there are tokens to hand out
    if matches!(config.auth.mode, AuthMode::Jwt) {
        api = api
            .route("/auth/register", post(register))
            .route("/auth/login", post(login));
    }

    let api = api
        .layer(middleware::from_fn(
            move |headers: HeaderMap, req: Request, next: Next| {
                let auth = Arc::clone(&auth_service);
                auth_middleware(auth, headers, req, next)
            },
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins))
}
