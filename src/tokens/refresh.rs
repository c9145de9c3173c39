use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

use super::TokenError;

/// Entropy per refresh token (256 bits).
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// Mint an opaque refresh token: OS randomness, base64url without padding.
///
/// No uniqueness check is made; collisions are negligible at this size.
///
/// # Errors
///
/// Returns [`TokenError::Entropy`] if the OS random source fails.
pub fn generate_refresh_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(TokenError::Entropy)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}
