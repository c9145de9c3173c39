//! Password reset credentials: one per email, short TTL, single use.

use std::{sync::Arc, time::Duration};
use tracing::instrument;

use super::{KeyValueStore, StoreError};

pub const DEFAULT_RESET_TTL: Duration = Duration::from_secs(15 * 60);

const BEARER_PREFIX: &str = "Bearer ";

fn reset_key(email: &str) -> String {
    format!("reset:{email}")
}

/// Stored form of a reset credential for `token`.
#[must_use]
pub fn bearer_credential(token: &str) -> String {
    format!("{BEARER_PREFIX}{token}")
}

#[derive(Debug, Clone)]
pub struct ResetTokenStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ResetTokenStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store `credential` for `email`, replacing any outstanding one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    #[instrument(skip(self, credential))]
    pub async fn put(&self, email: &str, credential: &str, ttl: Duration) -> Result<(), StoreError> {
        self.kv.set_ex(&reset_key(email), credential, ttl).await
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no live credential exists for `email`.
    pub async fn get(&self, email: &str) -> Result<String, StoreError> {
        self.kv
            .get(&reset_key(email))
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    pub async fn delete(&self, email: &str) -> Result<(), StoreError> {
        self.kv.delete(&reset_key(email)).await?;
        Ok(())
    }

    /// Redeem the credential for `email` with the presented bearer token.
    ///
    /// The delete only succeeds if the stored value is still the one that was checked,
    /// so two concurrent consumers can not both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing is outstanding (or another consumer
    /// won the race) and [`StoreError::Mismatch`] when the token differs.
    #[instrument(skip(self, presented))]
    pub async fn consume(&self, email: &str, presented: &str) -> Result<(), StoreError> {
        let stored = self.get(email).await?;
        let expected = bearer_credential(presented);
        if stored != expected {
            return Err(StoreError::Mismatch);
        }

        if self.kv.compare_and_delete(&reset_key(email), &expected).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}
