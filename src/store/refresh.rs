//! Refresh token lifecycle: at most one live token per user.
//!
//! Layout:
//! - `refresh:user:{user_id}` holds the current token
//! - `refresh:token:{sha256_hex(token)}` maps a presented token back to its owner
//!
//! Both entries share the same TTL. The reverse index only stores a digest so a key dump
//! never reveals usable tokens.

use sha2::{Digest, Sha256};
use std::{fmt::Write as _, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

use super::{KeyValueStore, StoreError};

fn user_key(user_id: i64) -> String {
    format!("refresh:user:{user_id}")
}

fn token_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut key = String::with_capacity(14 + digest.len() * 2);
    key.push_str("refresh:token:");
    for byte in digest {
        let _ = write!(key, "{byte:02x}");
    }
    key
}

#[derive(Debug, Clone)]
pub struct RefreshTokenStore {
    kv: Arc<dyn KeyValueStore>,
}

impl RefreshTokenStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store `token` as the user's only refresh token, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    #[instrument(skip(self, token))]
    pub async fn put(&self, user_id: i64, token: &str, ttl: Duration) -> Result<(), StoreError> {
        if let Some(previous) = self.kv.get(&user_key(user_id)).await? {
            self.kv.delete(&token_key(&previous)).await?;
        }

        self.kv.set_ex(&user_key(user_id), token, ttl).await?;
        self.kv
            .set_ex(&token_key(token), &user_id.to_string(), ttl)
            .await
    }

    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the user has no live refresh token.
    pub async fn get(&self, user_id: i64) -> Result<String, StoreError> {
        self.kv
            .get(&user_key(user_id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Find the user a presented token was issued to.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable or holds a corrupt owner id.
    #[instrument(skip_all)]
    pub async fn owner(&self, token: &str) -> Result<Option<i64>, StoreError> {
        let Some(owner) = self.kv.get(&token_key(token)).await? else {
            return Ok(None);
        };

        owner
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::Backend("corrupt refresh token owner".to_string()))
    }

    /// Atomically replace `presented` with `next`.
    ///
    /// Returns `false` when `presented` is no longer the user's current token, which is
    /// what a second use of the same refresh token sees.
    ///
    /// The reverse index for `next` is written before the swap, so once the swap lands
    /// nothing else can fail: dropping the old index entry is best effort, and a stale
    /// entry can not be redeemed because the swap checks the user's current token.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable before the swap.
    #[instrument(skip(self, presented, next))]
    pub async fn rotate(
        &self,
        user_id: i64,
        presented: &str,
        next: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.kv
            .set_ex(&token_key(next), &user_id.to_string(), ttl)
            .await?;

        let swapped = match self
            .kv
            .compare_and_swap(&user_key(user_id), presented, next, ttl)
            .await
        {
            Ok(swapped) => swapped,
            Err(err) => {
                self.discard_index(next).await;
                return Err(err);
            }
        };
        if !swapped {
            debug!("refresh token no longer current");
            self.discard_index(next).await;
            return Ok(false);
        }

        self.discard_index(presented).await;
        Ok(true)
    }

    async fn discard_index(&self, token: &str) {
        if let Err(err) = self.kv.delete(&token_key(token)).await {
            warn!("failed to drop refresh token index entry: {err}");
        }
    }

    /// Revoke the user's refresh token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: i64) -> Result<(), StoreError> {
        if let Some(current) = self.kv.get(&user_key(user_id)).await? {
            self.kv.delete(&token_key(&current)).await?;
        }
        self.kv.delete(&user_key(user_id)).await?;
        Ok(())
    }
}
