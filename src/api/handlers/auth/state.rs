//! Auth configuration and shared state.

use sqlx::PgPool;
use std::time::Duration;

use crate::account::{AuthFlow, LockoutPolicy, TotpEngine};

use super::storage::PgCredentialStore;

const DEFAULT_ISSUER: &str = "MountainAuth";
const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_ENROLLMENT_TTL_SECONDS: u64 = 10 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    session_ttl_seconds: i64,
    challenge_ttl_seconds: u64,
    enrollment_ttl_seconds: u64,
    lockout: LockoutPolicy,
    session_cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            enrollment_ttl_seconds: DEFAULT_ENROLLMENT_TTL_SECONDS,
            lockout: LockoutPolicy::default(),
            session_cookie_secure: false,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: u64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn challenge_ttl_seconds(&self) -> u64 {
        self.challenge_ttl_seconds
    }

    pub(crate) fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }
}

/// Shared auth state: configuration plus the flow controller wired to the
/// Postgres credential store.
pub struct AuthState {
    config: AuthConfig,
    flow: AuthFlow<PgCredentialStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, pool: PgPool) -> Self {
        let flow = AuthFlow::with_ttls(
            PgCredentialStore::new(pool),
            *config.lockout(),
            TotpEngine::new(config.issuer().to_string()),
            Duration::from_secs(config.challenge_ttl_seconds()),
            Duration::from_secs(config.enrollment_ttl_seconds),
        );
        Self { config, flow }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn flow(&self) -> &AuthFlow<PgCredentialStore> {
        &self.flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_constants() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer(), "MountainAuth");
        assert_eq!(config.session_ttl_seconds(), 12 * 60 * 60);
        assert_eq!(config.lockout().max_attempts(), 5);
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn builders_override_fields() {
        let config = AuthConfig::new()
            .with_issuer("Basecamp".to_string())
            .with_session_ttl_seconds(60)
            .with_session_cookie_secure(true);
        assert_eq!(config.issuer(), "Basecamp");
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(config.session_cookie_secure());
    }
}
