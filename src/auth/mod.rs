pub mod password;

use anyhow::{Context, Result};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::{AuthConfig, AuthMode};

/// Header carrying the caller's user id when authentication is disabled
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a decimal string
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, stored in request extensions by the auth middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Missing,
    #[error("invalid credentials")]
    Invalid,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

pub struct AuthService {
    mode: AuthMode,
    keys: Option<JwtKeys>,
    token_ttl_minutes: i64,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let keys = match config.mode {
            AuthMode::Jwt => {
                let secret = config
                    .jwt_secret
                    .as_deref()
                    .context("JWT_SECRET is required for jwt auth mode")?;
                Some(JwtKeys {
                    encoding: EncodingKey::from_secret(secret.as_bytes()),
                    decoding: DecodingKey::from_secret(secret.as_bytes()),
                })
            }
            AuthMode::None => None,
        };

        Ok(Self {
            mode: config.mode.clone(),
            keys,
            token_ttl_minutes: config.token_ttl_minutes,
        })
    }

    /// Issue an HS256 access token for `user_id`
    pub fn issue_token(&self, user_id: i64) -> Result<String> {
        let keys = self
            .keys
            .as_ref()
            .context("tokens can only be issued in jwt auth mode")?;
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.token_ttl_minutes * 60,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .context("failed to sign access token")
    }

    fn verify_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let keys = self.keys.as_ref().ok_or(AuthError::Invalid)?;
        let data = decode::<Claims>(token, &keys.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!("rejected access token: {e}");
                AuthError::Invalid
            })?;
        let user_id = data.claims.sub.parse().map_err(|_| AuthError::Invalid)?;
        Ok(AuthUser { user_id })
    }

    /// Resolve the caller from request headers.
    ///
    /// `Ok(None)` means no credentials were presented; malformed or expired
    /// credentials are an error.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<AuthUser>, AuthError> {
        match self.mode {
            AuthMode::Jwt => {
                let Some(value) = headers.get(header::AUTHORIZATION) else {
                    return Ok(None);
                };
                let token = value
                    .to_str()
                    .ok()
                    .and_then(|v| v.strip_prefix("Bearer "))
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or(AuthError::Invalid)?;
                self.verify_token(token).map(Some)
            }
            AuthMode::None => {
                let Some(value) = headers.get(USER_ID_HEADER) else {
                    return Ok(None);
                };
                let user_id = value
                    .to_str()
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .ok_or(AuthError::Invalid)?;
                Ok(Some(AuthUser { user_id }))
            }
        }
    }
}

/// Attach the caller to the request when valid credentials are present.
///
/// Missing or invalid credentials leave the request anonymous; handlers that
/// need a caller extract [`AuthUser`] and reject with 401.
pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    match auth_service.authenticate(&headers) {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(e) => debug!("treating request as anonymous: {e}"),
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AuthError::Missing)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn jwt_service() -> AuthService {
        AuthService::new(&AuthConfig {
            mode: AuthMode::Jwt,
            jwt_secret: Some("test-secret".into()),
            token_ttl_minutes: 5,
        })
        .unwrap()
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issued_token_authenticates() {
        let auth = jwt_service();
        let token = auth.issue_token(42).unwrap();
        let user = auth.authenticate(&bearer(&token)).unwrap();
        assert_eq!(user, Some(AuthUser { user_id: 42 }));
    }

    #[test]
    fn test_missing_and_invalid_tokens() {
        let auth = jwt_service();
        assert_eq!(auth.authenticate(&HeaderMap::new()).unwrap(), None);
        assert!(matches!(
            auth.authenticate(&bearer("not-a-token")),
            Err(AuthError::Invalid)
        ));

        let other = AuthService::new(&AuthConfig {
            mode: AuthMode::Jwt,
            jwt_secret: Some("another-secret".into()),
            token_ttl_minutes: 5,
        })
        .unwrap();
        let foreign = other.issue_token(1).unwrap();
        assert!(auth.authenticate(&bearer(&foreign)).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = AuthService::new(&AuthConfig {
            mode: AuthMode::Jwt,
            jwt_secret: Some("test-secret".into()),
            token_ttl_minutes: -10,
        })
        .unwrap();
        let token = auth.issue_token(1).unwrap();
        assert!(auth.authenticate(&bearer(&token)).is_err());
    }

    #[test]
    fn test_none_mode_uses_user_id_header() {
        let auth = AuthService::new(&AuthConfig {
            mode: AuthMode::None,
            jwt_secret: None,
            token_ttl_minutes: 60,
        })
        .unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(auth.authenticate(&headers).unwrap(), None);

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("7"));
        assert_eq!(
            auth.authenticate(&headers).unwrap(),
            Some(AuthUser { user_id: 7 })
        );

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("seven"));
        assert!(auth.authenticate(&headers).is_err());
        assert!(auth.issue_token(7).is_err());
    }
}
