use axum::{extract::Extension, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::instrument;

use super::UserResponse;
use crate::api::{error::ApiError, middleware::Subject, state::AuthState};

#[utoipa::path(
    get,
    path = "/auth/profile",
    responses (
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Missing or invalid bearer token", body = crate::api::error::ErrorBody),
        (status = 404, description = "User no longer exists", body = crate::api::error::ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users",
)]
#[instrument(skip_all)]
pub async fn profile(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(subject): Extension<Subject>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .users()
        .find_by_email(subject.email())
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(Json(UserResponse::from(&user)))
}
