use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::{fmt::Display, time::Duration};
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use crate::store::StoreError;
use crate::tokens::TokenError;
use crate::users::{password::PasswordError, UserStoreError};

/// Body of every non-2xx response.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    NotFound(String),
    #[error("too many requests")]
    RateLimited { retry_after: Duration },
    #[error("dependency failure: {0}")]
    Dependency(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Authentication(message.into())
    }

    pub fn internal(cause: impl Display) -> Self {
        Self::Internal(cause.to_string())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Dependency(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Whole seconds, rounded up so clients never retry early.
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs();
    if retry_after.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl IntoResponse for ApiError {
    /// Backend failures are logged server-side and surfaced as a generic `500`.
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Dependency(cause) => {
                error!("Dependency failure: {cause}");
                "internal server error".to_string()
            }
            Self::Internal(cause) => {
                error!("Internal error: {cause}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();

        if let Self::RateLimited { retry_after } = self {
            response.headers_mut().insert(
                RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }

        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Dependency(err.to_string())
    }
}

impl From<UserStoreError> for ApiError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::EmailExists => Self::validation("user already exists"),
            UserStoreError::NotFound => Self::NotFound("user not found".to_string()),
            UserStoreError::Backend(cause) => Self::Dependency(cause),
        }
    }
}

// Verification failures are mapped by the bearer guard; anything reaching here is issuance.
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        Self::internal(err)
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        Self::internal(err)
    }
}
