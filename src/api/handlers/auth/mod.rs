//! Auth handlers and supporting modules.
//!
//! Login runs the account-security state machine in `crate::account`; the
//! modules here only translate between HTTP and the flow controller. Session
//! tokens are random 32-byte values stored hashed; the MFA challenge cookie
//! carries nothing but an opaque id.

pub(crate) mod login;
pub(crate) mod mfa;
pub(crate) mod principal;
pub(crate) mod register;
pub(crate) mod session;
mod state;
mod storage;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
pub use storage::PgCredentialStore;
pub(crate) use utils::{
    is_unique_violation, normalize_handle, valid_email, valid_handle, valid_password,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::account::AuthError;

/// Map a flow rejection onto an HTTP response. Library and store failures
/// are logged server-side and surface as a generic 500.
pub(crate) fn auth_error_response(err: AuthError) -> Response {
    match &err {
        AuthError::InvalidCredentials
        | AuthError::MfaInvalid
        | AuthError::ChallengeExpired => (StatusCode::UNAUTHORIZED, err.to_string()).into_response(),
        AuthError::AccountLocked { .. } | AuthError::LockoutTriggered { .. } => {
            (StatusCode::LOCKED, err.to_string()).into_response()
        }
        AuthError::AlreadyExists => (StatusCode::CONFLICT, err.to_string()).into_response(),
        AuthError::Internal(inner) => {
            error!("auth operation failed: {inner:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejections_map_to_expected_statuses() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (
                AuthError::AccountLocked {
                    remaining: Duration::minutes(20),
                },
                StatusCode::LOCKED,
            ),
            (
                AuthError::LockoutTriggered {
                    retry_after: Duration::minutes(30),
                },
                StatusCode::LOCKED,
            ),
            (AuthError::MfaInvalid, StatusCode::UNAUTHORIZED),
            (AuthError::ChallengeExpired, StatusCode::UNAUTHORIZED),
            (AuthError::AlreadyExists, StatusCode::CONFLICT),
            (
                AuthError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(auth_error_response(err).status(), expected);
        }
    }
}
