use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use rsa::pkcs1v15::Signature;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

use super::TokenError;
use crate::keys::{KeyManager, SIGNING_ALG};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl TokenHeader {
    fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: SIGNING_ALG.to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

/// Access token claims. Every field is required; timestamps are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

/// Mints RS256 access tokens with the process key.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyManager>,
    issuer: String,
    access_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(keys: Arc<KeyManager>, issuer: impl Into<String>, access_ttl: Duration) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            access_ttl,
        }
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Issue an access token for `subject`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the RSA signature cannot be produced.
    pub fn issue_access_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_access_token_at(subject, Utc::now().timestamp())
    }

    /// Issue an access token as if the current time were `now` (unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the RSA signature cannot be produced.
    pub fn issue_access_token_at(&self, subject: &str, now: i64) -> Result<String, TokenError> {
        let key = self.keys.current();
        let header = TokenHeader::rs256(key.kid());
        let claims = AccessClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_seconds(self.access_ttl)),
            iss: self.issuer.clone(),
        };

        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(&claims)?);
        let signature: Signature = key
            .signer()
            .try_sign(signing_input.as_bytes())
            .map_err(TokenError::Signing)?;
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

        Ok(format!("{signing_input}.{signature_b64}"))
    }
}

/// Verifies access tokens against the process key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyManager>,
    issuer: String,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(keys: Arc<KeyManager>, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    /// Verify `token` and return its subject.
    ///
    /// # Errors
    ///
    /// See [`TokenVerifier::verify_claims_at`].
    pub fn verify_access_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify_claims_at(token, Utc::now().timestamp())
            .map(|claims| claims.sub)
    }

    /// Verify `token` as of `now` (unix seconds) and return the decoded claims.
    ///
    /// The signature is checked before the claims are decoded, so a tampered
    /// payload always surfaces as a signature mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the token has fewer than three segments, or the header or claims are not valid
    ///   base64url/JSON,
    /// - the header names an algorithm other than RS256,
    /// - the `kid` is not the active key,
    /// - the signature does not verify,
    /// - the issuer differs or `exp` is not in the future.
    pub fn verify_claims_at(&self, token: &str, now: i64) -> Result<AccessClaims, TokenError> {
        // anything past the second dot is signature material; a stray dot there is a
        // corrupted signature, not a malformed token
        let mut parts = token.splitn(3, '.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != SIGNING_ALG {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let key = self.keys.current();
        if header.kid != key.kid() {
            return Err(TokenError::UnknownKeyId(header.kid));
        }

        let signing_input = format!("{header_b64}.{claims_b64}");
        let signature_bytes =
            Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::SignatureMismatch)?;
        let signature = Signature::try_from(signature_bytes.as_slice())
            .map_err(|_| TokenError::SignatureMismatch)?;
        key.verifier()
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| TokenError::SignatureMismatch)?;

        let claims: AccessClaims = b64d_json(claims_b64)?;
        if claims.iss != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::tokens::TokenErrorKind;

    const NOW: i64 = 1_700_000_000;
    const ISSUER: &str = "authsvc-test";

    fn pair() -> (TokenIssuer, TokenVerifier) {
        let keys = Arc::new(testutil::key_manager());
        (
            TokenIssuer::new(keys.clone(), ISSUER, Duration::from_secs(3600)),
            TokenVerifier::new(keys, ISSUER),
        )
    }

    fn forge(header: &serde_json::Value, claims: &serde_json::Value, sig: &str) -> String {
        let h = Base64UrlUnpadded::encode_string(header.to_string().as_bytes());
        let c = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());
        format!("{h}.{c}.{sig}")
    }

    #[test]
    fn issued_token_verifies_to_subject() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("42", NOW)?;
        let claims = verifier.verify_claims_at(&token, NOW + 10)?;

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 3600);
        assert_eq!(claims.iss, ISSUER);
        Ok(())
    }

    #[test]
    fn verify_with_wall_clock() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token("7")?;
        assert_eq!(verifier.verify_access_token(&token)?, "7");
        Ok(())
    }

    #[test]
    fn header_carries_kid_and_alg() -> Result<(), TokenError> {
        let keys = Arc::new(testutil::key_manager());
        let issuer = TokenIssuer::new(keys.clone(), ISSUER, Duration::from_secs(60));
        let token = issuer.issue_access_token_at("1", NOW)?;
        let header_b64 = token.split('.').next().ok_or(TokenError::Malformed)?;
        let header: TokenHeader = b64d_json(header_b64)?;

        assert_eq!(header.alg, "RS256");
        assert_eq!(header.typ, "JWT");
        assert_eq!(header.kid, keys.kid());
        Ok(())
    }

    #[test]
    fn expired_at_exact_boundary() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("42", NOW)?;

        assert!(verifier.verify_claims_at(&token, NOW + 3599).is_ok());
        let err = verifier
            .verify_claims_at(&token, NOW + 3600)
            .err()
            .ok_or(TokenError::Malformed)?;
        assert_eq!(err.kind(), TokenErrorKind::Expired);
        Ok(())
    }

    #[test]
    fn tampered_claims_fail_signature() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("42", NOW)?;
        let parts: Vec<&str> = token.split('.').collect();

        let forged_claims = serde_json::json!({"sub": "1", "iat": NOW, "exp": NOW + 3600, "iss": ISSUER});
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            Base64UrlUnpadded::encode_string(forged_claims.to_string().as_bytes()),
            parts[2]
        );

        let err = verifier
            .verify_claims_at(&forged, NOW)
            .err()
            .ok_or(TokenError::Malformed)?;
        assert_eq!(err.kind(), TokenErrorKind::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn garbled_signature_is_signature_mismatch() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("42", NOW)?;
        let (signed, _) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;

        for sig in ["", "!!!", "AAAA"] {
            let err = verifier
                .verify_claims_at(&format!("{signed}.{sig}"), NOW)
                .err()
                .ok_or(TokenError::Malformed)?;
            assert_eq!(err.kind(), TokenErrorKind::SignatureMismatch, "sig {sig:?}");
        }
        Ok(())
    }

    #[test]
    fn every_signature_bit_flip_is_signature_mismatch() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("ada@example.com", NOW)?;
        let (signed, sig) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;

        for (index, byte) in sig.bytes().enumerate() {
            for bit in 0..7 {
                let mut flipped = sig.as_bytes().to_vec();
                flipped[index] = byte ^ (1 << bit);
                let flipped: String = flipped.into_iter().map(char::from).collect();

                let result = verifier.verify_claims_at(&format!("{signed}.{flipped}"), NOW);
                assert!(
                    result
                        .as_ref()
                        .is_err_and(|e| e.kind() == TokenErrorKind::SignatureMismatch),
                    "byte {index} bit {bit}: {result:?}"
                );
            }
        }
        Ok(())
    }

    #[test]
    fn dot_inside_signature_is_signature_mismatch() -> Result<(), TokenError> {
        let (issuer, verifier) = pair();
        let token = issuer.issue_access_token_at("ada@example.com", NOW)?;

        let err = verifier
            .verify_claims_at(&format!("{token}.extra"), NOW)
            .err()
            .ok_or(TokenError::Malformed)?;
        assert_eq!(err.kind(), TokenErrorKind::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn token_from_another_key_is_rejected() -> Result<(), TokenError> {
        let other = Arc::new(testutil::other_key_manager());
        let foreign = TokenIssuer::new(other, ISSUER, Duration::from_secs(3600));
        let (_, verifier) = pair();
        let token = foreign.issue_access_token_at("42", NOW)?;

        let err = verifier
            .verify_claims_at(&token, NOW)
            .err()
            .ok_or(TokenError::Malformed)?;
        assert!(matches!(err, TokenError::UnknownKeyId(_)));
        assert_eq!(err.kind(), TokenErrorKind::SignatureMismatch);
        Ok(())
    }

    #[test]
    fn wrong_issuer_is_invalid() -> Result<(), TokenError> {
        let keys = Arc::new(testutil::key_manager());
        let issuer = TokenIssuer::new(keys.clone(), "someone-else", Duration::from_secs(3600));
        let verifier = TokenVerifier::new(keys, ISSUER);
        let token = issuer.issue_access_token_at("42", NOW)?;

        let err = verifier
            .verify_claims_at(&token, NOW)
            .err()
            .ok_or(TokenError::Malformed)?;
        assert!(matches!(err, TokenError::InvalidIssuer));
        assert_eq!(err.kind(), TokenErrorKind::Invalid);
        Ok(())
    }

    #[test]
    fn algorithm_confusion_is_rejected() {
        let keys = testutil::key_manager();
        let (_, verifier) = pair();
        let claims = serde_json::json!({"sub": "42", "iat": NOW, "exp": NOW + 60, "iss": ISSUER});

        for alg in ["none", "HS256", "RS512"] {
            let header = serde_json::json!({"alg": alg, "typ": "JWT", "kid": keys.kid()});
            let token = forge(&header, &claims, "");
            let result = verifier.verify_claims_at(&token, NOW);
            assert!(
                matches!(result, Err(TokenError::UnsupportedAlgorithm(ref a)) if a == alg),
                "alg {alg} accepted: {result:?}"
            );
        }
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let (_, verifier) = pair();

        for token in ["", "abc", "a.b", "a.b.c.d", "%%%.e30.sig"] {
            let result = verifier.verify_claims_at(token, NOW);
            assert!(
                result
                    .as_ref()
                    .is_err_and(|e| e.kind() == TokenErrorKind::Invalid),
                "token {token:?}: {result:?}"
            );
        }
    }
}
