use axum::{extract::Extension, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::state::AuthState;

#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses (
        (status = 200, description = "Public signing key set", body = crate::keys::Jwks),
    ),
    tag = "keys",
)]
/// Publish the active signing key so other services can verify access tokens offline.
pub async fn jwks(Extension(state): Extension<Arc<AuthState>>) -> impl IntoResponse {
    Json(state.keys().discovery_document())
}
