//! Account security state machine.
//!
//! Login-attempt tracking, account lockout, password hashing, and TOTP
//! multi-factor authentication. The [`flow::AuthFlow`] controller is the
//! coordination point; everything else here is a leaf it orchestrates.
//! Persistence goes through the [`store::CredentialStore`] boundary so the
//! machine can be exercised without a database.

pub mod challenge;
pub mod error;
pub mod flow;
pub mod lockout;
pub mod password;
pub mod store;
pub mod totp;

pub use error::AuthError;
pub use flow::{AuthFlow, LoginOutcome, SessionClaims};
pub use lockout::{LockoutPolicy, LockoutState};
pub use store::{Account, CredentialStore, Role};
pub use totp::TotpEngine;
