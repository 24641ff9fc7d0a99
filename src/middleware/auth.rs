use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use crate::error::ApiError;
use crate::security::{SecurityContext, SecurityManager};

/// Security context of the caller, built from the `Authorization: Bearer` header.
///
/// A request without the header gets the anonymous context (no
/// authentications); a token no provider accepts is rejected with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub Arc<SecurityContext>);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    Arc<SecurityManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let manager = Arc::<SecurityManager>::from_ref(state);
        let token = bearer_token(parts)?;
        let context = manager.create_security_context(token.as_deref()).await?;
        tracing::debug!("Security context '{}' for {}", context.id(), parts.uri.path());
        Ok(Caller(Arc::new(context)))
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, ApiError> {
    let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::bad_request("Invalid Authorization header format"))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::bad_request("Empty bearer token")),
        None => Err(ApiError::bad_request("Authorization header must use Bearer token format")),
    }
}
