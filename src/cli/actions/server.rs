use crate::account::LockoutPolicy;
use crate::api;
use anyhow::Result;
use chrono::Duration;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub issuer: String,
    pub session_ttl_seconds: i64,
    pub max_login_attempts: u32,
    pub lock_minutes: i64,
    pub secure_cookies: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let lockout = LockoutPolicy::new(args.max_login_attempts, Duration::minutes(args.lock_minutes));

    let auth_config = api::AuthConfig::new()
        .with_issuer(args.issuer)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_lockout(lockout)
        .with_session_cookie_secure(args.secure_cookies);

    api::new(args.port, args.dsn, auth_config).await
}
