use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub auth: AuthConfig,
    pub analytics: AnalyticsConfig,
    pub pagination: PaginationConfig,
    pub cors_origins: Vec<String>,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Trust the `X-User-Id` header. Development only.
    None,
    Jwt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "AuthConfig::default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

/// How the client IP of a view event is derived from request headers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    #[default]
    None,
    /// Trust Forwarded / X-Forwarded-For
    Standard,
    /// Trust CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Number of trusted proxy hops to skip from the right of X-Forwarded-For
    pub num_trusted_proxies: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Secret for signing list cursors. Random per process when unset.
    pub cursor_hmac_secret: Option<String>,
}

impl AuthConfig {
    const fn default_token_ttl_minutes() -> i64 {
        60
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trusted_proxy_mode: TrustedProxyMode::None,
            num_trusted_proxies: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./quill.db?mode=rwc".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let auth_mode = match std::env::var("AUTH_MODE")
            .unwrap_or_else(|_| "jwt".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => AuthMode::None,
            "jwt" => AuthMode::Jwt,
            other => {
                tracing::warn!(
                    "Unknown AUTH_MODE '{other}', falling back to 'jwt'. Supported values: none, jwt"
                );
                AuthMode::Jwt
            }
        };

        let jwt_secret = std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty());
        if matches!(auth_mode, AuthMode::Jwt) && jwt_secret.is_none() {
            anyhow::bail!("JWT_SECRET must be set when AUTH_MODE=jwt");
        }

        let token_ttl_minutes = std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(AuthConfig::default_token_ttl_minutes);

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "none" => TrustedProxyMode::None,
            other => {
                tracing::warn!("Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'");
                TrustedProxyMode::None
            }
        };
        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            auth: AuthConfig {
                mode: auth_mode,
                jwt_secret,
                token_ttl_minutes,
            },
            analytics: AnalyticsConfig {
                trusted_proxy_mode,
                num_trusted_proxies,
            },
            pagination: PaginationConfig {
                cursor_hmac_secret: std::env::var("CURSOR_HMAC_SECRET").ok(),
            },
            cors_origins,
            frontend_url,
        })
    }
}
