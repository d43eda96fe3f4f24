//! Small helpers for credential validation and session token handling.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

/// Normalize a handle for lookup: surrounding whitespace only; case is
/// significant, matching the original records.
pub(crate) fn normalize_handle(handle: &str) -> String {
    handle.trim().to_string()
}

/// Handles are 3-30 characters from a conservative alphabet.
pub(crate) fn valid_handle(handle: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9._-]{3,30}$").is_ok_and(|re| re.is_match(handle))
}

/// Basic email shape check on already-trimmed input.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub(crate) fn valid_password(password: &str) -> bool {
    password.len() >= MIN_PASSWORD_LEN
}

/// Create a new session token for the auth cookie. The raw value is only
/// returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn normalize_handle_trims() {
        assert_eq!(normalize_handle("  alice "), "alice");
    }

    #[test]
    fn handle_length_bounds() {
        assert!(valid_handle("abc"));
        assert!(valid_handle("a.very-long_handle.under30char"));
        assert!(!valid_handle("ab"));
        assert!(!valid_handle(&"x".repeat(31)));
        assert!(!valid_handle("no spaces"));
    }

    #[test]
    fn email_shape() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn password_minimum_length() {
        assert!(valid_password("123456"));
        assert!(!valid_password("12345"));
    }

    #[test]
    fn session_token_is_32_random_bytes() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn token_hash_is_stable_and_distinct() {
        assert_eq!(hash_session_token("token"), hash_session_token("token"));
        assert_ne!(hash_session_token("token"), hash_session_token("other"));
    }
}
