//! Access and refresh token issuance and verification.
//!
//! Access tokens are compact JWS (`header.claims.signature`) signed with RS256 by the
//! process key. Refresh tokens are opaque random strings; their lifecycle lives in
//! [`crate::store::refresh`].

mod access;
mod error;
mod refresh;

pub use access::{AccessClaims, TokenHeader, TokenIssuer, TokenVerifier};
pub use error::{TokenError, TokenErrorKind};
pub use refresh::{generate_refresh_token, REFRESH_TOKEN_BYTES};

pub const TOKEN_TYPE: &str = "Bearer";
