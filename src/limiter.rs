//! Adaptive per-client rate limiting for credential endpoints.
//!
//! Each client gets a fixed window counter. Going over the limit inside a window trips a
//! block; while blocked every request is rejected without touching the counter, and the
//! first request after the block starts a fresh window.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

use crate::store::StoreError;

pub const DEFAULT_MAX_ATTEMPTS: u64 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_BLOCK: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u64,
    pub window: Duration,
    pub block: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
            block: DEFAULT_BLOCK,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u64 },
    /// This request pushed the client over the limit and started a block.
    Tripped { retry_after: Duration },
    /// The client was already blocked.
    Blocked { retry_after: Duration },
}

impl RateLimitDecision {
    #[cfg(test)]
    pub(crate) fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Allowed { .. } => None,
            Self::Tripped { retry_after } | Self::Blocked { retry_after } => Some(*retry_after),
        }
    }
}

/// Backend holding per-client counters. `hit` must be atomic per client.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(
        &self,
        client: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError>;
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    /// Record one attempt from `client` and decide whether it may proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    #[instrument(skip(self))]
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision, StoreError> {
        let decision = self.store.hit(client, &self.policy).await?;

        match decision {
            RateLimitDecision::Tripped { retry_after } => {
                warn!(
                    client,
                    retry_after_secs = retry_after.as_secs(),
                    "too many attempts, client blocked"
                );
            }
            RateLimitDecision::Blocked { retry_after } => {
                debug!(
                    client,
                    retry_after_secs = retry_after.as_secs(),
                    "rejected blocked client"
                );
            }
            RateLimitDecision::Allowed { remaining } => {
                debug!(client, remaining, "attempt allowed");
            }
        }

        Ok(decision)
    }
}
