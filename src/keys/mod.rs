//! Signing key ownership and publication.
//!
//! The service holds exactly one RSA key pair for its lifetime. It is generated
//! at startup, shared by reference between the token issuer and verifier, and
//! published as a JWKS document so other services can verify access tokens
//! offline. Nothing is persisted: a restart produces a new key and invalidates
//! every outstanding access token.

mod jwks;

pub use jwks::{Jwk, Jwks};

use base64ct::{Base64UrlUnpadded, Encoding};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rsa::pkcs1v15::{SigningKey, VerifyingKey};
use rsa::pkcs8::EncodePublicKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::info;

/// JWS algorithm bound to the RSA key type.
pub const SIGNING_ALG: &str = "RS256";
pub const MIN_KEY_BITS: usize = 2048;
pub const DEFAULT_KEY_BITS: usize = 2048;

// Bytes of the SHA-1 fingerprint kept for the key id.
const KID_DIGEST_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key size {0} is below the {MIN_KEY_BITS}-bit minimum")]
    KeyTooSmall(usize),
    #[error("rsa error")]
    Rsa(#[from] rsa::Error),
    #[error("failed to encode public key")]
    Encoding(#[from] rsa::pkcs8::spki::Error),
    #[error("invalid base64url encoding")]
    Base64,
}

/// One RSA key pair together with its derived key id.
pub struct KeyPair {
    kid: String,
    public: RsaPublicKey,
    signer: SigningKey<Sha256>,
    verifier: VerifyingKey<Sha256>,
}

impl KeyPair {
    fn new(private: RsaPrivateKey) -> Result<Self, KeyError> {
        let public = RsaPublicKey::from(&private);
        let kid = key_id(&public)?;
        Ok(Self {
            kid,
            verifier: VerifyingKey::<Sha256>::new(public.clone()),
            public,
            signer: SigningKey::<Sha256>::new(private),
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub(crate) fn signer(&self) -> &SigningKey<Sha256> {
        &self.signer
    }

    pub(crate) fn verifier(&self) -> &VerifyingKey<Sha256> {
        &self.verifier
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kid", &self.kid)
            .field("private", &"***")
            .finish_non_exhaustive()
    }
}

/// Owner of the process signing key.
///
/// Readers take a cheap `Arc` snapshot of the active pair under a read lock,
/// so concurrent verification never blocks on other verifiers.
#[derive(Debug)]
pub struct KeyManager {
    active: RwLock<Arc<KeyPair>>,
}

impl KeyManager {
    /// Generate a fresh RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits` is below [`MIN_KEY_BITS`] or the entropy source fails.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::KeyTooSmall(bits));
        }

        let private = RsaPrivateKey::new(&mut OsRng, bits)?;
        let manager = Self::from_private_key(private)?;

        info!(kid = %manager.kid(), bits, "generated signing key");

        Ok(manager)
    }

    /// Wrap an existing private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the public key cannot be encoded to derive its key id.
    pub fn from_private_key(private: RsaPrivateKey) -> Result<Self, KeyError> {
        Ok(Self {
            active: RwLock::new(Arc::new(KeyPair::new(private)?)),
        })
    }

    /// Snapshot of the active key pair.
    #[must_use]
    pub fn current(&self) -> Arc<KeyPair> {
        Arc::clone(&self.active.read())
    }

    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        self.current().public_key().clone()
    }

    #[must_use]
    pub fn kid(&self) -> String {
        self.current().kid().to_string()
    }

    /// Build the key set document from the active key.
    #[must_use]
    pub fn discovery_document(&self) -> Jwks {
        let pair = self.current();
        Jwks {
            keys: vec![Jwk::from_rsa_public_key(pair.public_key(), pair.kid())],
        }
    }
}

/// Derive the key id: truncated SHA-1 of the DER `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns an error if the public key cannot be DER encoded.
pub fn key_id(public: &RsaPublicKey) -> Result<String, KeyError> {
    let spki = public.to_public_key_der()?;
    let digest = Sha1::digest(spki.as_bytes());
    Ok(Base64UrlUnpadded::encode_string(&digest[..KID_DIGEST_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn kid_is_stable_across_discovery_documents() {
        let keys = testutil::key_manager();
        let first = keys.discovery_document();
        let second = keys.discovery_document();

        assert_eq!(first.keys[0].kid, second.keys[0].kid);
        assert_eq!(first, second);
    }

    #[test]
    fn kid_is_rederivable_from_published_key() -> Result<(), KeyError> {
        let keys = testutil::key_manager();
        let jwks = keys.discovery_document();
        let public = jwks.keys[0].to_rsa_public_key()?;

        assert_eq!(key_id(&public)?, keys.kid());
        // 8 bytes of digest encode to 11 base64url characters
        assert_eq!(keys.kid().len(), 11);
        Ok(())
    }

    #[test]
    fn rejects_small_keys() {
        let result = KeyManager::generate(1024);
        assert!(matches!(result, Err(KeyError::KeyTooSmall(1024))));
    }

    #[test]
    fn generate_produces_distinct_keys() -> Result<(), KeyError> {
        let first = KeyManager::generate(DEFAULT_KEY_BITS)?;
        let second = testutil::key_manager();

        assert_ne!(first.kid(), second.kid());
        assert_eq!(first.discovery_document().keys.len(), 1);
        Ok(())
    }

    #[test]
    fn debug_hides_private_material() {
        let keys = testutil::key_manager();
        let rendered = format!("{:?}", keys.current());

        assert!(rendered.contains(&keys.kid()));
        assert!(rendered.contains("***"));
    }
}
