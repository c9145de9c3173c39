use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{limiter, storage, tokens, ARG_PORT};
use crate::limiter::RateLimitPolicy;
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;

fn seconds(matches: &clap::ArgMatches, id: &str, default: u64) -> Duration {
    Duration::from_secs(matches.get_one::<u64>(id).copied().unwrap_or(default))
}

fn secret(matches: &clap::ArgMatches, id: &str) -> Option<SecretString> {
    matches
        .get_one::<String>(id)
        .filter(|value| !value.trim().is_empty())
        .map(|value| SecretString::from(value.clone()))
}

/// # Errors
/// Returns an error if the arguments can not be turned into an action.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let issuer = matches
        .get_one::<String>(tokens::ARG_ISSUER)
        .cloned()
        .unwrap_or_else(|| crate::api::state::DEFAULT_ISSUER.to_string());

    let key_bits = matches
        .get_one::<u16>(tokens::ARG_KEY_BITS)
        .map_or(crate::keys::DEFAULT_KEY_BITS, |&bits| usize::from(bits));

    let rate_limit = RateLimitPolicy {
        max_attempts: matches
            .get_one::<u64>(limiter::ARG_RATE_LIMIT_MAX)
            .copied()
            .unwrap_or(crate::limiter::DEFAULT_MAX_ATTEMPTS),
        window: seconds(matches, limiter::ARG_RATE_LIMIT_WINDOW, 600),
        block: seconds(matches, limiter::ARG_RATE_LIMIT_BLOCK, 300),
    };

    Ok(Action::Server(Args {
        port,
        dsn: secret(matches, storage::ARG_DSN),
        redis_url: secret(matches, storage::ARG_REDIS_URL),
        issuer,
        key_bits,
        access_token_ttl: seconds(matches, tokens::ARG_ACCESS_TOKEN_TTL, 3600),
        refresh_token_ttl: seconds(matches, tokens::ARG_REFRESH_TOKEN_TTL, 604_800),
        reset_token_ttl: seconds(matches, tokens::ARG_RESET_TOKEN_TTL, 900),
        rate_limit,
    }))
}
