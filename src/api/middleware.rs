//! Request guards: bearer authentication and login throttling.

use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, warn};

use super::{error::ApiError, state::AuthState};
use crate::tokens::{TokenError, TokenErrorKind};

/// Verified caller of a protected route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    sub: String,
    token: String,
}

impl Subject {
    /// The normalized email the access token was issued to.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.sub
    }

    /// The bearer token the caller authenticated with.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| ApiError::unauthorized("invalid authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }
    Ok(token)
}

fn reject(err: &TokenError) -> ApiError {
    match err.kind() {
        TokenErrorKind::Expired => {
            debug!("Rejected expired access token");
            ApiError::unauthorized("token expired")
        }
        TokenErrorKind::SignatureMismatch => {
            warn!("Rejected access token: {err}");
            ApiError::unauthorized("invalid token")
        }
        TokenErrorKind::Invalid => {
            debug!("Rejected malformed access token: {err}");
            ApiError::unauthorized("invalid token")
        }
        TokenErrorKind::Internal => ApiError::internal(err),
    }
}

/// Verify the bearer token and expose the caller as a [`Subject`] extension.
///
/// # Errors
///
/// Returns `401` for a missing, malformed, forged or expired token.
pub async fn require_bearer(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?.to_string();
    let sub = state
        .verifier()
        .verify_access_token(&token)
        .map_err(|err| reject(&err))?;

    request.extensions_mut().insert(Subject { sub, token });

    Ok(next.run(request).await)
}

/// Extract a client IP for rate limiting from common proxy headers.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn client_identity(request: &Request) -> String {
    extract_client_ip(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Count the attempt against the caller and reject it with `429` when over the limit.
///
/// A limiter backend failure rejects the request rather than letting it through.
///
/// # Errors
///
/// Returns `429` with `Retry-After` when blocked, `500` when the limiter is unavailable.
pub async fn rate_limit(
    Extension(state): Extension<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_identity(&request);
    let decision = state.limiter().check(&client).await?;

    if let Some(retry_after) = decision.retry_after() {
        return Err(ApiError::RateLimited { retry_after });
    }

    Ok(next.run(request).await)
}
