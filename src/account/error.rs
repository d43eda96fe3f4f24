//! Error taxonomy for the authentication flow.
//!
//! Unknown handles and wrong passwords share one variant and one user-facing
//! message, so responses never confirm whether a handle exists. Lock and MFA
//! rejections may be specific: by then the caller has already been through
//! the password stage.

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, or no such account. Deliberately indistinguishable.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// An active lock rejected the attempt before password verification.
    #[error("Account locked; try again in {} minute(s)", minutes_up(*.remaining))]
    AccountLocked { remaining: Duration },

    /// This failure crossed the attempt threshold and set the lock.
    #[error("Too many failed attempts; account locked for {} minute(s)", minutes_up(*.retry_after))]
    LockoutTriggered { retry_after: Duration },

    /// Wrong TOTP code. The pending challenge stays open.
    #[error("Invalid verification code")]
    MfaInvalid,

    /// No live challenge or enrollment for the caller; restart from login.
    #[error("Verification expired; start over")]
    ChallengeExpired,

    /// Registration or update collided with an existing handle or email.
    #[error("Username or email already exists")]
    AlreadyExists,

    /// Store, hasher, or TOTP library failure. Aborts the operation; never
    /// reported as a verification result.
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

/// Whole minutes, rounded up, for user-facing lock messages.
fn minutes_up(duration: Duration) -> i64 {
    (duration.num_seconds() + 59) / 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_handle_and_bad_password_share_a_message() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
    }

    #[test]
    fn locked_message_rounds_minutes_up() {
        let err = AuthError::AccountLocked {
            remaining: Duration::seconds(19 * 60 + 30),
        };
        assert_eq!(err.to_string(), "Account locked; try again in 20 minute(s)");
    }

    #[test]
    fn lockout_triggered_reads_differently_from_plain_mismatch() {
        let triggered = AuthError::LockoutTriggered {
            retry_after: Duration::minutes(30),
        }
        .to_string();
        assert_ne!(triggered, AuthError::InvalidCredentials.to_string());
        assert!(triggered.contains("30"));
    }
}
