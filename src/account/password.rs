//! Password hashing with Argon2id.
//!
//! Every call to [`hash`] draws a fresh salt, including password resets, so
//! a prior salt is never reused. Library failures are errors for the caller
//! to abort on; they are never collapsed into a verification result.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;

/// Hash a plaintext password into a PHC-formatted Argon2id string.
///
/// # Errors
/// Returns an error if hashing fails; the plaintext is never stored as a
/// fallback.
pub fn hash(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// # Errors
/// Returns an error when the stored hash cannot be parsed; a mismatched
/// password is `Ok(false)`, not an error.
pub fn verify(plaintext: &str, stored_hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}
