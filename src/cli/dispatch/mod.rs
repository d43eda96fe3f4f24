//! Command-line argument dispatch and server initialization.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        issuer: auth_opts.issuer,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        max_login_attempts: auth_opts.max_login_attempts,
        lock_minutes: auth_opts.lock_minutes,
        secure_cookies: auth_opts.secure_cookies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn dispatch_builds_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("MOUNTAIN_AUTH_PORT", None::<&str>),
                ("MOUNTAIN_AUTH_SESSION_TTL_SECONDS", None),
                ("MOUNTAIN_AUTH_MAX_LOGIN_ATTEMPTS", None),
                ("MOUNTAIN_AUTH_LOCK_MINUTES", None),
                ("MOUNTAIN_AUTH_SECURE_COOKIES", None),
                ("MOUNTAIN_AUTH_ISSUER", None),
            ],
            || {
                let matches = commands::new().try_get_matches_from(vec![
                    "mountain-auth",
                    "--dsn",
                    "postgres://localhost/mountain_auth",
                    "--port",
                    "9000",
                ])?;
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 9000);
                assert_eq!(args.dsn, "postgres://localhost/mountain_auth");
                assert_eq!(args.max_login_attempts, 5);
                assert_eq!(args.lock_minutes, 30);
                assert!(!args.secure_cookies);
                Ok(())
            },
        )
    }
}
