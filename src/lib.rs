//! # authsvc (Token Authority)
//!
//! `authsvc` registers users, issues short-lived RS256 access tokens together with
//! long-lived opaque refresh tokens, verifies bearer tokens on protected routes,
//! supports a password-reset flow and throttles abusive login attempts.
//!
//! ## Keys
//!
//! A single RSA key pair is generated at startup and shared by reference between the
//! issuer and the verifier. Its public half is published at `/.well-known/jwks.json`
//! so downstream services can verify access tokens offline. Keys are never persisted:
//! restarting the process invalidates every outstanding access token.
//!
//! ## Refresh tokens
//!
//! Refresh tokens are 256 random bits, stored per user with a TTL. Exchanging one is an
//! atomic compare-and-swap, so a refresh token can be used exactly once.
//!
//! ## Storage
//!
//! Refresh tokens, reset credentials and rate-limit counters live behind the
//! [`store::KeyValueStore`] and [`limiter::RateLimitStore`] traits. Redis backs them in
//! production; the in-memory store is used when no Redis URL is configured. Users live
//! in `PostgreSQL` (`sql/schema.sql`) or in memory when no DSN is given.

pub mod api;
pub mod cli;
pub mod keys;
pub mod limiter;
pub mod store;
pub mod tokens;
pub mod users;

#[cfg(test)]
mod testutil;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
