use crate::{
    api::{self, AuthConfig, AuthState},
    cli::telemetry,
    keys::KeyManager,
    limiter::{RateLimitPolicy, RateLimitStore},
    store::{KeyValueStore, MemoryStore, RedisStore},
    users::{MemoryUserRepository, PgUserRepository, UserRepository},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<SecretString>,
    pub redis_url: Option<SecretString>,
    pub issuer: String,
    pub key_bits: usize,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub rate_limit: RateLimitPolicy,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_issuer(self.issuer.clone())
            .with_access_token_ttl(self.access_token_ttl)
            .with_refresh_token_ttl(self.refresh_token_ttl)
            .with_reset_token_ttl(self.reset_token_ttl)
            .with_rate_limit(self.rate_limit)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key can not be generated, a configured backend is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let bits = args.key_bits;
    let keys = tokio::task::spawn_blocking(move || KeyManager::generate(bits))
        .await?
        .context("Failed to generate signing key")?;

    let (kv, limits) = connect_store(args.redis_url.as_ref()).await?;
    let users = connect_users(args.dsn.as_ref()).await?;

    let state = AuthState::new(args.auth_config(), Arc::new(keys), kv, limits, users);

    let result = api::new(args.port, Arc::new(state)).await;

    telemetry::shutdown_tracer();

    result
}

async fn connect_store(
    redis_url: Option<&SecretString>,
) -> Result<(Arc<dyn KeyValueStore>, Arc<dyn RateLimitStore>)> {
    if let Some(url) = redis_url {
        let store = Arc::new(
            RedisStore::connect(url.expose_secret())
                .await
                .context("Failed to connect to redis")?,
        );
        let kv: Arc<dyn KeyValueStore> = store.clone();
        let limits: Arc<dyn RateLimitStore> = store;
        return Ok((kv, limits));
    }

    warn!("No redis url configured, tokens and rate limits are kept in memory");
    let store = Arc::new(MemoryStore::new());
    store.spawn_janitor(JANITOR_INTERVAL);
    let kv: Arc<dyn KeyValueStore> = store.clone();
    let limits: Arc<dyn RateLimitStore> = store;
    Ok((kv, limits))
}

async fn connect_users(dsn: Option<&SecretString>) -> Result<Arc<dyn UserRepository>> {
    let Some(dsn) = dsn else {
        warn!("No database configured, users are kept in memory");
        return Ok(Arc::new(MemoryUserRepository::new()));
    };

    let repo = PgUserRepository::connect(dsn.expose_secret())
        .await
        .context("Failed to connect to database")?;
    repo.apply_schema()
        .await
        .context("Failed to apply database schema")?;

    Ok(Arc::new(repo))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_ref()
                .map_or_else(|| "memory".to_string(), |dsn| redact_dsn(dsn.expose_secret())),
        ),
        (
            "redis_url",
            args.redis_url
                .as_ref()
                .map_or_else(|| "memory".to_string(), |url| redact_dsn(url.expose_secret())),
        ),
        ("issuer", args.issuer.clone()),
        ("key_bits", args.key_bits.to_string()),
        (
            "access_token_ttl",
            format!("{}s", args.access_token_ttl.as_secs()),
        ),
        (
            "refresh_token_ttl",
            format!("{}s", args.refresh_token_ttl.as_secs()),
        ),
        (
            "reset_token_ttl",
            format!("{}s", args.reset_token_ttl.as_secs()),
        ),
        (
            "rate_limit",
            format!(
                "{} per {}s, block {}s",
                args.rate_limit.max_attempts,
                args.rate_limit.window.as_secs(),
                args.rate_limit.block.as_secs()
            ),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
