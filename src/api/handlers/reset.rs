//! Password reset: an authenticated caller files a request, then redeems it once with
//! the same bearer token and a new password.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::api::{error::ApiError, middleware::Subject, state::AuthState};
use crate::store::{reset::bearer_credential, StoreError};
use crate::users::{normalize_email, password::hash_password_blocking, valid_email, valid_password};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct ResetRequest {
    email: String,
    token: String,
    new_password: String,
}

impl fmt::Debug for ResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    post,
    path = "/auth/reset-request",
    responses (
        (status = 202, description = "Reset credential stored for the caller"),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reset",
)]
#[instrument(skip_all)]
pub async fn reset_request(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(subject): Extension<Subject>,
) -> Result<StatusCode, ApiError> {
    state
        .reset_tokens()
        .put(
            subject.email(),
            &bearer_credential(subject.token()),
            state.config().reset_token_ttl(),
        )
        .await?;

    debug!("reset requested for {}", subject.email());

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/auth/reset",
    request_body = ResetRequest,
    responses (
        (status = 204, description = "Password replaced, refresh token revoked"),
        (status = 400, description = "Missing or invalid fields", body = crate::api::error::ErrorBody),
        (status = 401, description = "Token does not match the outstanding request", body = crate::api::error::ErrorBody),
        (status = 404, description = "Unknown email or no outstanding reset request", body = crate::api::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reset",
)]
#[instrument(skip_all)]
pub async fn reset(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<ResetRequest>>,
) -> Result<StatusCode, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::validation("invalid email"));
    }
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ApiError::validation("token is required"));
    }
    if !valid_password(&request.new_password) {
        return Err(ApiError::validation("password too short"));
    }

    let user = state
        .users()
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    state
        .reset_tokens()
        .consume(&email, token)
        .await
        .map_err(|err| match err {
            StoreError::NotFound => ApiError::NotFound("no outstanding reset request".to_string()),
            StoreError::Mismatch => ApiError::unauthorized("reset token mismatch"),
            StoreError::Backend(_) => ApiError::from(err),
        })?;

    if let Err(err) = replace_password(&state, user.id, request.new_password).await {
        // the credential was consumed but the password is unchanged; hand it back
        if let Err(restore) = state
            .reset_tokens()
            .put(&email, &bearer_credential(token), state.config().reset_token_ttl())
            .await
        {
            warn!("failed to restore reset credential: {restore}");
        }
        return Err(err);
    }

    state.refresh_tokens().delete(user.id).await?;

    info!("password reset for user {}", user.id);

    Ok(StatusCode::NO_CONTENT)
}

async fn replace_password(
    state: &AuthState,
    user_id: i64,
    password: String,
) -> Result<(), ApiError> {
    let password_hash = hash_password_blocking(password).await?;
    state.users().update_password(user_id, &password_hash).await?;
    Ok(())
}
