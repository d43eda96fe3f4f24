//! # MountainAuth
//!
//! Session-based authentication service with script management.
//!
//! ## Account security
//!
//! Login is guarded by an account-security state machine: failed attempts are
//! counted, the fifth failure locks the account for 30 minutes, and a stale
//! lock restarts the counter instead of extending the lock. Passwords are
//! hashed with Argon2id; second factors are TOTP (SHA-1, 6 digits, 30-second
//! step) enrolled through a two-phase confirm step so a secret is never
//! committed until the authenticator proves it captured it.
//!
//! ## Sessions and roles
//!
//! Sessions are random bearer tokens stored hashed in PostgreSQL and handed
//! out in `HttpOnly` cookies. A binary admin/user role gates the admin
//! console and script mutations.
//!
//! ## Scripts
//!
//! Admins register python/bash scripts by path; any authenticated user can
//! request a run, which records a `pending` execution. Nothing is executed
//! in-process.

pub mod account;
pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
