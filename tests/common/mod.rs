//! Shared helpers for the API integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use quill::analytics::{AnalyticsService, AnalyticsStore, SystemClock};
use quill::api::create_api_router;
use quill::auth::AuthService;
use quill::config::*;
use quill::models::NewUser;
use quill::storage::{SqliteStorage, Storage};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::{Layer, ServiceExt};

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<SqliteStorage>,
}

pub fn test_config(mode: AuthMode) -> Config {
    Config {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
        },
        api_server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        },
        auth: AuthConfig {
            mode,
            jwt_secret: Some("integration-test-secret".to_string()),
            token_ttl_minutes: 60,
        },
        analytics: AnalyticsConfig::default(),
        pagination: PaginationConfig {
            cursor_hmac_secret: Some("integration-cursor-secret".to_string()),
        },
        cors_origins: vec![],
        frontend_url: "http://localhost:3000".to_string(),
    }
}

pub async fn spawn_app(config: Config) -> TestApp {
    let storage = Arc::new(SqliteStorage::new("sqlite::memory:", 5).await.unwrap());
    storage.init().await.unwrap();

    let store: Arc<dyn AnalyticsStore> = storage.clone();
    let analytics = Arc::new(AnalyticsService::new(store, Arc::new(SystemClock)));
    let auth = Arc::new(AuthService::new(&config.auth).unwrap());

    let router = create_api_router(storage.clone(), analytics, auth, &config);
    TestApp { router, storage }
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
pub struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        let app = TestConnectInfoLayer.layer(self.router.clone());
        app.oneshot(request).await.unwrap()
    }

    pub async fn create_user(&self, name: &str) -> i64 {
        self.storage
            .create_user(&NewUser {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                bio: String::new(),
                avatar: None,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn create_category(&self, name: &str) -> i64 {
        self.storage
            .create_category(name, &name.to_lowercase())
            .await
            .unwrap()
            .id
    }
}

/// Request as `user_id` in `AuthMode::None`
pub fn request(method: &str, uri: &str, user_id: Option<i64>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Request carrying a bearer token, for `AuthMode::Jwt`
pub fn bearer_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
