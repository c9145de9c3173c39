use axum::{extract::Extension, http::StatusCode};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::api::{error::ApiError, middleware::Subject, state::AuthState};

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses (
        (status = 204, description = "Refresh token revoked"),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::error::ErrorBody),
        (status = 404, description = "User no longer exists", body = crate::api::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth",
)]
/// Revoke the caller's refresh token. The access token stays valid until it expires.
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(subject): Extension<Subject>,
) -> Result<StatusCode, ApiError> {
    let user = state
        .users()
        .find_by_email(subject.email())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;
    state.refresh_tokens().delete(user.id).await?;

    info!("user {} logged out", user.id);

    Ok(StatusCode::NO_CONTENT)
}
