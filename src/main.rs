use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quill::analytics::{AnalyticsService, AnalyticsStore, SystemClock};
use quill::api;
use quill::auth::AuthService;
use quill::config::{AuthMode, Config};
use quill::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    info!("Using SQLite storage: {}", config.database.url);
    let sqlite = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    info!("Initializing database...");
    sqlite.init().await?;
    info!("Database initialized successfully");

    let storage: Arc<dyn Storage> = sqlite.clone();
    let store: Arc<dyn AnalyticsStore> = sqlite;
    let analytics = Arc::new(AnalyticsService::new(store, Arc::new(SystemClock)));

    let auth_service = Arc::new(AuthService::new(&config.auth)?);
    match config.auth.mode {
        AuthMode::None => {
            info!("🔓 Authentication is disabled - callers are identified by the X-User-Id header");
        }
        AuthMode::Jwt => {
            info!(
                "🔐 JWT authentication enabled (tokens valid for {} minutes)",
                config.auth.token_ttl_minutes
            );
        }
    }
    info!(
        "Client IP trust mode: {:?}",
        config.analytics.trusted_proxy_mode
    );

    let app = api::create_api_router(storage, analytics, auth_service, &config);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);
    info!("   - API endpoints available at http://{}/api/...", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
