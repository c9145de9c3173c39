use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::UserResponse;
use crate::api::{error::ApiError, state::AuthState};
use crate::users::{normalize_email, password::hash_password_blocking, valid_email, valid_password};

#[derive(ToSchema, Serialize, Deserialize)]
pub struct SignInRequest {
    name: String,
    email: String,
    password: String,
}

impl fmt::Debug for SignInRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[utoipa::path(
    post,
    path = "/signin",
    request_body = SignInRequest,
    responses (
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Missing or invalid fields, or email already registered", body = crate::api::error::ErrorBody),
            ),
    tag = "users",
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<SignInRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::validation("missing payload"));
    };

    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::validation("invalid email"));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::validation("password too short"));
    }

    let password_hash = hash_password_blocking(request.password).await?;
    let user = state.users().create(name, &email, &password_hash).await?;

    info!("registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}
