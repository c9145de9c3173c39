pub mod health;
pub mod jwks;
pub mod login;
pub mod logout;
pub mod profile;
pub mod refresh;
pub mod register;
pub mod reset;

// common types and functions for the handlers
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::{error::ApiError, state::AuthState};
use crate::tokens::{generate_refresh_token, TOKEN_TYPE};
use crate::users::User;

/// Public view of a user; never carries the password hash.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

impl TokenResponse {
    fn new(state: &AuthState, access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE.to_string(),
            expires_in: state.issuer().access_ttl().as_secs(),
        }
    }
}

/// Mint an access token for the user's email and a fresh refresh token, replacing any
/// refresh token the user already had.
pub(crate) async fn issue_session(
    state: &AuthState,
    user: &User,
) -> Result<TokenResponse, ApiError> {
    let access_token = state.issuer().issue_access_token(&user.email)?;
    let refresh_token = generate_refresh_token()?;

    state
        .refresh_tokens()
        .put(user.id, &refresh_token, state.config().refresh_token_ttl())
        .await?;

    debug!("session issued for user {}", user.id);

    Ok(TokenResponse::new(state, access_token, refresh_token))
}
