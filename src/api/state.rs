//! Shared request state and its configuration.

use std::{sync::Arc, time::Duration};

use crate::keys::KeyManager;
use crate::limiter::{RateLimitPolicy, RateLimitStore, RateLimiter};
use crate::store::{reset::DEFAULT_RESET_TTL, KeyValueStore, RefreshTokenStore, ResetTokenStore};
use crate::tokens::{TokenIssuer, TokenVerifier};
use crate::users::UserRepository;

pub const DEFAULT_ISSUER: &str = "authsvc";
const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    reset_token_ttl: Duration,
    rate_limit: RateLimitPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            reset_token_ttl: DEFAULT_RESET_TTL,
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl(mut self, ttl: Duration) -> Self {
        self.reset_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    #[must_use]
    pub fn reset_token_ttl(&self) -> Duration {
        self.reset_token_ttl
    }

    #[must_use]
    pub fn rate_limit(&self) -> RateLimitPolicy {
        self.rate_limit
    }
}

/// Handles injected into every handler through `Extension<Arc<AuthState>>`.
pub struct AuthState {
    config: AuthConfig,
    keys: Arc<KeyManager>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    refresh_tokens: RefreshTokenStore,
    reset_tokens: ResetTokenStore,
    limiter: RateLimiter,
    users: Arc<dyn UserRepository>,
    kv: Arc<dyn KeyValueStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        keys: Arc<KeyManager>,
        kv: Arc<dyn KeyValueStore>,
        limits: Arc<dyn RateLimitStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            issuer: TokenIssuer::new(keys.clone(), config.issuer(), config.access_token_ttl()),
            verifier: TokenVerifier::new(keys.clone(), config.issuer()),
            refresh_tokens: RefreshTokenStore::new(kv.clone()),
            reset_tokens: ResetTokenStore::new(kv.clone()),
            limiter: RateLimiter::new(limits, config.rate_limit()),
            config,
            keys,
            users,
            kv,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &RefreshTokenStore {
        &self.refresh_tokens
    }

    #[must_use]
    pub fn reset_tokens(&self) -> &ResetTokenStore {
        &self.reset_tokens
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    #[must_use]
    pub fn kv(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::default();

        assert_eq!(config.issuer(), "authsvc");
        assert_eq!(config.access_token_ttl(), Duration::from_secs(3600));
        assert_eq!(config.refresh_token_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.reset_token_ttl(), Duration::from_secs(900));
        assert_eq!(config.rate_limit(), RateLimitPolicy::default());
    }

    #[test]
    fn builder_overrides() {
        let config = AuthConfig::default()
            .with_issuer("other")
            .with_access_token_ttl(Duration::from_secs(60))
            .with_refresh_token_ttl(Duration::from_secs(120))
            .with_reset_token_ttl(Duration::from_secs(30));

        assert_eq!(config.issuer(), "other");
        assert_eq!(config.access_token_ttl(), Duration::from_secs(60));
        assert_eq!(config.refresh_token_ttl(), Duration::from_secs(120));
        assert_eq!(config.reset_token_ttl(), Duration::from_secs(30));
    }
}
