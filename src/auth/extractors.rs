use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use crate::error::ApiError;

/// Authentication gate. A handler that takes `AuthUser` only runs for a
/// request carrying a valid bearer token.
///
/// Missing or unparseable credential → 401. Token that fails verification → 403.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            warn!(path = %parts.uri.path(), "request without bearer token");
            ApiError::Unauthenticated("Access token required".into())
        })?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, path = %parts.uri.path(), "invalid or expired token");
            ApiError::forbidden("Invalid or expired token")
        })?;

        Ok(AuthUser(claims.id))
    }
}
