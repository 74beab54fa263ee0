use crate::services::SessionKey;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use portal_core::error::AppError;

/// Bearer token forwarded by the browser, and the session it identifies.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token: String,
    pub session: SessionKey,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
            })?;

        Ok(Self {
            token: token.to_string(),
            session: SessionKey::from_token(token),
        })
    }
}
