//! API route handlers.
//!
//! Auth endpoints delegate to the account-security flow; admin, profile and
//! script endpoints gate on the session principal resolved from the cookie.

pub mod admin;
pub mod auth;
pub mod health;
pub mod profile;
pub mod scripts;
