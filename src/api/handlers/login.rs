use axum::{extract::Extension, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use super::{issue_session, TokenResponse};
use crate::api::{error::ApiError, state::AuthState};
use crate::users::{normalize_email, password::verify_password_blocking};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Access and refresh tokens", body = TokenResponse),
        (status = 400, description = "Missing email or password", body = crate::api::error::ErrorBody),
        (status = 401, description = "Invalid credentials", body = crate::api::error::ErrorBody),
        (status = 429, description = "Too many attempts; see Retry-After", body = crate::api::error::ErrorBody),
    ),
    tag = "auth",
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("missing payload"));
    };

    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let Some(user) = state.users().find_by_email(&email).await? else {
        debug!("login for unknown email");
        return Err(ApiError::unauthorized("invalid credentials"));
    };

    if !verify_password_blocking(request.password, user.password_hash.clone()).await? {
        debug!("login with wrong password for user {}", user.id);
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let session = issue_session(&state, &user).await?;

    Ok(Json(session))
}
