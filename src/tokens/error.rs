use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Malformed,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("failed to sign token")]
    Signing(#[source] rsa::signature::Error),
    #[error("entropy source unavailable")]
    Entropy(#[source] rand::Error),
}

/// Coarse classification used for logging and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    Invalid,
    SignatureMismatch,
    Expired,
    /// Issuance failures, never caused by the presented token.
    Internal,
}

impl TokenError {
    #[must_use]
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::Malformed
            | Self::Base64
            | Self::Json(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::InvalidIssuer => TokenErrorKind::Invalid,
            Self::UnknownKeyId(_) | Self::SignatureMismatch => TokenErrorKind::SignatureMismatch,
            Self::Expired => TokenErrorKind::Expired,
            Self::Signing(_) | Self::Entropy(_) => TokenErrorKind::Internal,
        }
    }
}
