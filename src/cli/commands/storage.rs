use clap::{Arg, Command};

pub const ARG_DSN: &str = "dsn";
pub const ARG_REDIS_URL: &str = "redis-url";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("PostgreSQL connection string for the users table")
                .long_help(
                    "PostgreSQL connection string for the users table. Users are kept in memory when omitted.",
                )
                .env("AUTHSVC_DSN"),
        )
        .arg(
            Arg::new(ARG_REDIS_URL)
                .long(ARG_REDIS_URL)
                .help("Redis URL for refresh tokens, reset tokens and rate limits")
                .long_help(
                    "Redis URL for refresh tokens, reset tokens and rate limits. An in-process store is used when omitted.",
                )
                .env("AUTHSVC_REDIS_URL"),
        )
}
