//! Argon2id password hashing. Hashes are PHC strings carrying their own salt and
//! parameters.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    Empty,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed")]
    Malformed,
    #[error("password task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// # Errors
///
/// Returns an error if `password` is empty or hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string. Empty passwords never match.
///
/// # Errors
///
/// Returns [`PasswordError::Malformed`] if `hash` is not a PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    if password.is_empty() {
        return Ok(false);
    }

    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::Malformed)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
///
/// See [`hash_password`].
pub async fn hash_password_blocking(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
///
/// See [`verify_password`].
pub async fn verify_password_blocking(
    password: String,
    hash: String,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<(), PasswordError> {
        let hash = hash_password("correct horse")?;

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash)?);
        assert!(!verify_password("wrong horse", &hash)?);
        Ok(())
    }

    #[test]
    fn salts_differ() -> Result<(), PasswordError> {
        assert_ne!(hash_password("secret")?, hash_password("secret")?);
        Ok(())
    }

    #[test]
    fn empty_password_rejected() -> Result<(), PasswordError> {
        assert!(matches!(hash_password(""), Err(PasswordError::Empty)));
        let hash = hash_password("secret")?;
        assert!(!verify_password("", &hash)?);
        Ok(())
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("secret", "not-a-phc-string"),
            Err(PasswordError::Malformed)
        ));
    }

    #[tokio::test]
    async fn blocking_variants_agree() -> Result<(), PasswordError> {
        let hash = hash_password_blocking("secret".to_string()).await?;
        assert!(verify_password_blocking("secret".to_string(), hash).await?);
        Ok(())
    }
}
