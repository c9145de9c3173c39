use clap::{Arg, Command};

pub const ARG_ISSUER: &str = "issuer";
pub const ARG_KEY_BITS: &str = "key-bits";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl";
pub const ARG_RESET_TOKEN_TTL: &str = "reset-token-ttl";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Value of the `iss` claim in issued access tokens")
                .env("AUTHSVC_ISSUER")
                .default_value(crate::api::state::DEFAULT_ISSUER),
        )
        .arg(
            Arg::new(ARG_KEY_BITS)
                .long(ARG_KEY_BITS)
                .help("RSA modulus size of the signing key generated at startup")
                .env("AUTHSVC_KEY_BITS")
                .default_value("2048")
                .value_parser(clap::value_parser!(u16).range(2048..=8192)),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token TTL in seconds")
                .env("AUTHSVC_ACCESS_TOKEN_TTL")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token TTL in seconds")
                .env("AUTHSVC_REFRESH_TOKEN_TTL")
                .default_value("604800")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL)
                .long(ARG_RESET_TOKEN_TTL)
                .help("Password reset credential TTL in seconds")
                .env("AUTHSVC_RESET_TOKEN_TTL")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
