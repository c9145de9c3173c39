use clap::{Arg, Command};

pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";
pub const ARG_RATE_LIMIT_WINDOW: &str = "rate-limit-window";
pub const ARG_RATE_LIMIT_BLOCK: &str = "rate-limit-block";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("Login attempts allowed per client within one window")
                .env("AUTHSVC_RATE_LIMIT_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW)
                .long(ARG_RATE_LIMIT_WINDOW)
                .help("Rate limit window in seconds")
                .env("AUTHSVC_RATE_LIMIT_WINDOW")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_BLOCK)
                .long(ARG_RATE_LIMIT_BLOCK)
                .help("How long a client stays blocked once over the limit, in seconds")
                .env("AUTHSVC_RATE_LIMIT_BLOCK")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
