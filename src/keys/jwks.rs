use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::KeyError;

/// Published key set, served from `/.well-known/jwks.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    #[cfg(test)]
    fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize this JWKS to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(test)]
    fn find_by_kid(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    /// Describe an RSA verification key.
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: kid.into(),
            key_use: "sig".to_string(),
            alg: super::SIGNING_ALG.to_string(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Rebuild the RSA public key a verifier would use.
    ///
    /// # Errors
    ///
    /// Returns an error if the base64url values cannot be decoded or the RSA key is invalid.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, KeyError> {
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| KeyError::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| KeyError::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        Ok(RsaPublicKey::new(n, e)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn jwk_round_trips_to_the_same_public_key() -> Result<(), KeyError> {
        let keys = testutil::key_manager();
        let jwk = Jwk::from_rsa_public_key(&keys.public_key(), keys.kid());

        assert_eq!(jwk.to_rsa_public_key()?, keys.public_key());
        Ok(())
    }

    #[test]
    fn jwk_serializes_use_field() -> Result<(), serde_json::Error> {
        let keys = testutil::key_manager();
        let json = keys.discovery_document().to_json_pretty()?;
        let value: serde_json::Value = serde_json::from_str(&json)?;

        assert_eq!(value["keys"][0]["use"], "sig");
        assert_eq!(value["keys"][0]["kty"], "RSA");
        assert_eq!(value["keys"][0]["alg"], "RS256");
        // standard exponent 65537
        assert_eq!(value["keys"][0]["e"], "AQAB");
        assert!(value["keys"][0].get("key_use").is_none());
        Ok(())
    }

    #[test]
    fn find_by_kid_matches_only_published_key() -> Result<(), serde_json::Error> {
        let keys = testutil::key_manager();
        let json = keys.discovery_document().to_json_pretty()?;
        let jwks = Jwks::from_json(&json)?;

        assert!(jwks.find_by_kid(&keys.kid()).is_some());
        assert!(jwks.find_by_kid("other").is_none());
        Ok(())
    }
}
