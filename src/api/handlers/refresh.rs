use axum::{extract::Extension, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use super::TokenResponse;
use crate::api::{error::ApiError, state::AuthState};
use crate::tokens::generate_refresh_token;

#[derive(ToSchema, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    refresh_token: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshRequest").finish_non_exhaustive()
    }
}

fn invalid_refresh_token() -> ApiError {
    ApiError::unauthorized("invalid refresh token")
}

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshRequest,
    responses (
        (status = 200, description = "Rotated access and refresh tokens", body = TokenResponse),
        (status = 400, description = "Missing refresh token", body = crate::api::error::ErrorBody),
        (status = 401, description = "Unknown, expired or already used refresh token", body = crate::api::error::ErrorBody),
        (status = 404, description = "Token owner no longer exists", body = crate::api::error::ErrorBody),
    ),
    tag = "auth",
)]
/// Exchange a refresh token for a new pair. The presented token is single-use.
#[instrument(skip_all)]
pub async fn refresh(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("missing payload"));
    };

    let presented = request.refresh_token.trim();
    if presented.is_empty() {
        return Err(ApiError::validation("refreshToken is required"));
    }

    let Some(user_id) = state.refresh_tokens().owner(presented).await? else {
        debug!("refresh token has no owner");
        return Err(invalid_refresh_token());
    };

    let Some(user) = state.users().find_by_id(user_id).await? else {
        return Err(ApiError::NotFound("user not found".to_string()));
    };

    let next = generate_refresh_token()?;
    let rotated = state
        .refresh_tokens()
        .rotate(user.id, presented, &next, state.config().refresh_token_ttl())
        .await?;
    if !rotated {
        warn!("refresh token reuse for user {}", user.id);
        return Err(invalid_refresh_token());
    }

    let access_token = state.issuer().issue_access_token(&user.email)?;

    Ok(Json(TokenResponse::new(&state, access_token, next)))
}
