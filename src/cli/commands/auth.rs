//! Auth tuning arguments: session TTL, lockout policy and cookie flags.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_ISSUER: &str = "issuer";
pub const ARG_SESSION_TTL: &str = "session-ttl-seconds";
pub const ARG_MAX_LOGIN_ATTEMPTS: &str = "max-login-attempts";
pub const ARG_LOCK_MINUTES: &str = "lock-minutes";
pub const ARG_SECURE_COOKIES: &str = "secure-cookies";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer name shown in authenticator apps")
                .default_value("MountainAuth")
                .env("MOUNTAIN_AUTH_ISSUER"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .default_value("43200")
                .env("MOUNTAIN_AUTH_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(60..)),
        )
        .arg(
            Arg::new(ARG_MAX_LOGIN_ATTEMPTS)
                .long(ARG_MAX_LOGIN_ATTEMPTS)
                .help("Failed logins before the account locks")
                .default_value("5")
                .env("MOUNTAIN_AUTH_MAX_LOGIN_ATTEMPTS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_LOCK_MINUTES)
                .long(ARG_LOCK_MINUTES)
                .help("Lock duration in minutes after too many failures")
                .default_value("30")
                .env("MOUNTAIN_AUTH_LOCK_MINUTES")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SECURE_COOKIES)
                .long(ARG_SECURE_COOKIES)
                .help("Set the Secure attribute on session cookies")
                .env("MOUNTAIN_AUTH_SECURE_COOKIES")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub issuer: String,
    pub session_ttl_seconds: i64,
    pub max_login_attempts: u32,
    pub lock_minutes: i64,
    pub secure_cookies: bool,
}

impl Options {
    /// Read auth options back out of parsed matches.
    ///
    /// # Errors
    /// Never fails today; kept fallible so new options can validate.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            issuer: matches
                .get_one::<String>(ARG_ISSUER)
                .cloned()
                .unwrap_or_else(|| "MountainAuth".to_string()),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL)
                .copied()
                .unwrap_or(43200),
            max_login_attempts: matches
                .get_one::<u32>(ARG_MAX_LOGIN_ATTEMPTS)
                .copied()
                .unwrap_or(5),
            lock_minutes: matches.get_one::<i64>(ARG_LOCK_MINUTES).copied().unwrap_or(30),
            secure_cookies: matches.get_flag(ARG_SECURE_COOKIES),
        })
    }
}
