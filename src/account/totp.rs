//! TOTP engine: thin adapter over `totp-rs`.
//!
//! Standard parameters (SHA-1, 6 digits, 30-second step) with one step of
//! skew tolerated in either direction. Verification takes an explicit
//! timestamp so the flow controller and tests share one clock.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP: u64 = 30;

/// A freshly generated, not-yet-committed enrollment secret.
#[derive(Clone, Debug)]
pub struct GeneratedSecret {
    pub secret_base32: String,
    pub otpauth_url: String,
    pub qr_code_data_url: String,
}

#[derive(Clone, Debug)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    #[must_use]
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    /// Generate a fresh random secret plus the provisioning URI and QR code
    /// for the enrolling user's authenticator app.
    ///
    /// # Errors
    /// Returns an error if secret generation or QR rendering fails.
    pub fn generate(&self, account_name: &str) -> Result<GeneratedSecret> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|err| anyhow!("TOTP secret generation failed: {err:?}"))?;
        let totp = self.build(secret_bytes, account_name)?;

        let qr = totp
            .get_qr_base64()
            .map_err(|err| anyhow!("TOTP QR generation failed: {err}"))?;

        Ok(GeneratedSecret {
            secret_base32: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_code_data_url: format!("data:image/png;base64,{qr}"),
        })
    }

    /// Check a submitted code against a base32 secret at `now`.
    ///
    /// # Errors
    /// Returns an error when the stored secret is malformed. A wrong code is
    /// `Ok(false)`; it is never conflated with a library failure.
    pub fn verify(&self, secret_base32: &str, code: &str, now: DateTime<Utc>) -> Result<bool> {
        let timestamp = u64::try_from(now.timestamp())
            .map_err(|_| anyhow!("timestamp before epoch is not a valid TOTP time"))?;
        let totp = self.build(self.decode(secret_base32)?, "verify")?;
        Ok(totp.check(code.trim(), timestamp))
    }

    /// Expected code for a secret at `now`. Test support and enrollment
    /// previews only; never exposed over the API.
    #[cfg(test)]
    pub fn expected_code(&self, secret_base32: &str, now: DateTime<Utc>) -> Result<String> {
        let timestamp = u64::try_from(now.timestamp())
            .map_err(|_| anyhow!("timestamp before epoch is not a valid TOTP time"))?;
        let totp = self.build(self.decode(secret_base32)?, "verify")?;
        Ok(totp.generate(timestamp))
    }

    fn decode(&self, secret_base32: &str) -> Result<Vec<u8>> {
        Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|err| anyhow!("stored TOTP secret is not valid base32: {err:?}"))
    }

    fn build(&self, secret_bytes: Vec<u8>, account_name: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW,
            STEP,
            secret_bytes,
            Some(self.issuer.clone()),
            account_name.to_string(),
        )
        .map_err(|err| anyhow!("TOTP init error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn engine() -> TotpEngine {
        TotpEngine::new("MountainAuth".to_string())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn generated_secret_carries_provisioning_data() {
        let generated = engine().generate("alice").unwrap();
        assert!(!generated.secret_base32.is_empty());
        assert!(generated.otpauth_url.starts_with("otpauth://totp/"));
        assert!(generated.otpauth_url.contains("MountainAuth"));
        assert!(generated
            .qr_code_data_url
            .starts_with("data:image/png;base64,"));
    }

    #[test]
    fn current_code_verifies() {
        let engine = engine();
        let generated = engine.generate("alice").unwrap();
        let code = engine.expected_code(&generated.secret_base32, at(0)).unwrap();
        assert!(engine.verify(&generated.secret_base32, &code, at(0)).unwrap());
    }

    #[test]
    fn adjacent_window_is_tolerated() {
        let engine = engine();
        let generated = engine.generate("alice").unwrap();
        let code = engine.expected_code(&generated.secret_base32, at(0)).unwrap();
        assert!(engine
            .verify(&generated.secret_base32, &code, at(STEP as i64))
            .unwrap());
    }

    #[test]
    fn distant_window_is_rejected() {
        let engine = engine();
        let generated = engine.generate("alice").unwrap();
        let code = engine.expected_code(&generated.secret_base32, at(0)).unwrap();
        assert!(!engine
            .verify(&generated.secret_base32, &code, at(10 * STEP as i64))
            .unwrap());
    }

    #[test]
    fn wrong_code_is_rejected() {
        let engine = engine();
        let generated = engine.generate("alice").unwrap();
        assert!(!engine
            .verify(&generated.secret_base32, "000000", at(0))
            .unwrap()
            || !engine
                .verify(&generated.secret_base32, "999999", at(0))
                .unwrap());
    }

    #[test]
    fn malformed_secret_is_an_error() {
        assert!(engine().verify("not base32!!", "123456", at(0)).is_err());
    }
}
