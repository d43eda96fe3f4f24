//! Authentication flow controller.
//!
//! Orchestrates the lockout policy, password hasher, TOTP engine, and
//! credential store to answer "is this attempt valid, and what is the next
//! step?". Ordering is load-bearing:
//!
//! 1) unknown handle rejects with the same message as a wrong password;
//! 2) an active lock rejects before the hasher runs, so a locked account
//!    burns no hash-compare cost and its counter cannot move;
//! 3) a password mismatch is accounted atomically in the store, and a
//!    rejection that just crossed the threshold is reported distinctly;
//! 4) with MFA enabled, a match yields a pending challenge, not a session —
//!    the counter resets only once every required factor has passed;
//! 5) MFA code failures leave the challenge open and never touch the
//!    password lockout counter.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::challenge::{
    ChallengeStore, EnrollmentStore, MfaChallenge, PendingEnrollment,
};
use super::error::AuthError;
use super::lockout::LockoutPolicy;
use super::password;
use super::store::{CreateOutcome, CredentialStore, NewAccount, Role, SecurityUpdate};
use super::totp::{GeneratedSecret, TotpEngine};

pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_ENROLLMENT_TTL: Duration = Duration::from_secs(10 * 60);

/// What the session layer binds into a cookie once authentication completes.
#[derive(Clone, Debug)]
pub struct SessionClaims {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
}

/// Result of a credential submission that was not rejected.
#[derive(Debug)]
pub enum LoginOutcome {
    /// All required factors passed; issue a session.
    Authenticated(SessionClaims),
    /// Password passed but a TOTP code is owed. The caller holds the
    /// challenge id until the second factor resolves or is abandoned.
    MfaPending { challenge_id: Uuid },
}

pub struct AuthFlow<S> {
    store: S,
    policy: LockoutPolicy,
    totp: TotpEngine,
    challenges: ChallengeStore,
    enrollments: EnrollmentStore,
}

impl<S: CredentialStore> AuthFlow<S> {
    #[must_use]
    pub fn new(store: S, policy: LockoutPolicy, totp: TotpEngine) -> Self {
        Self::with_ttls(store, policy, totp, DEFAULT_CHALLENGE_TTL, DEFAULT_ENROLLMENT_TTL)
    }

    #[must_use]
    pub fn with_ttls(
        store: S,
        policy: LockoutPolicy,
        totp: TotpEngine,
        challenge_ttl: Duration,
        enrollment_ttl: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            totp,
            challenges: ChallengeStore::new(challenge_ttl),
            enrollments: EnrollmentStore::new(enrollment_ttl),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Process a credential submission.
    ///
    /// # Errors
    /// `InvalidCredentials` for unknown handles and password mismatches,
    /// `AccountLocked`/`LockoutTriggered` for lock rejections, `Internal`
    /// when the store or hasher fails.
    pub async fn login(
        &self,
        handle: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, AuthError> {
        let Some(account) = self.store.find_by_handle(handle).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        // Lock check comes before the hasher: a locked account must not pay
        // hash-compare cost, and its counter must not move.
        let state = account.lockout_state();
        if let Some(remaining) = self.policy.remaining(&state, now) {
            return Err(AuthError::AccountLocked { remaining });
        }

        if !password::verify(password, &account.password_hash)? {
            let updated = self
                .store
                .record_login_failure(account.id, now, &self.policy)
                .await?;
            // The pre-check ruled out an active lock, so a lock in the
            // updated state was set by this very failure.
            if self.policy.is_locked(&updated, now) {
                let retry_after = self
                    .policy
                    .remaining(&updated, now)
                    .unwrap_or_else(chrono::Duration::zero);
                return Err(AuthError::LockoutTriggered { retry_after });
            }
            return Err(AuthError::InvalidCredentials);
        }

        if account.mfa_enabled {
            // Credentials are valid but authentication is not complete; the
            // counter reset waits for the second factor.
            let challenge_id = self
                .challenges
                .insert(MfaChallenge {
                    account_id: account.id,
                    username: account.username.clone(),
                })
                .await;
            return Ok(LoginOutcome::MfaPending { challenge_id });
        }

        self.store.record_login_success(account.id).await?;
        Ok(LoginOutcome::Authenticated(SessionClaims {
            account_id: account.id,
            username: account.username,
            role: account.role,
        }))
    }

    /// Resolve a pending MFA challenge with a submitted code.
    ///
    /// # Errors
    /// `ChallengeExpired` when no live challenge matches (the caller must
    /// restart from the password step), `MfaInvalid` on a wrong code (the
    /// challenge stays open), `Internal` on library/store failure.
    pub async fn verify_mfa(
        &self,
        challenge_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthError> {
        let Some(challenge) = self.challenges.get(challenge_id).await else {
            return Err(AuthError::ChallengeExpired);
        };

        let Some(account) = self.store.find_by_handle(&challenge.username).await? else {
            self.challenges.remove(challenge_id).await;
            return Err(AuthError::ChallengeExpired);
        };

        let Some(secret) = account.mfa_secret.as_deref() else {
            // MFA was torn down while the challenge was pending.
            self.challenges.remove(challenge_id).await;
            return Err(AuthError::ChallengeExpired);
        };

        if !self.totp.verify(secret, code, now)? {
            // A wrong second factor is not a password failure; the lockout
            // counter is untouched and the challenge remains open.
            return Err(AuthError::MfaInvalid);
        }

        self.challenges.remove(challenge_id).await;
        self.store.record_login_success(account.id).await?;
        Ok(SessionClaims {
            account_id: account.id,
            username: account.username,
            role: account.role,
        })
    }

    /// Drop a pending challenge, e.g. when its owner starts a fresh login.
    /// Prevents a stale challenge for one handle being satisfied after the
    /// caller moved on to another.
    pub async fn abandon_challenge(&self, challenge_id: Uuid) {
        self.challenges.remove(challenge_id).await;
    }

    /// Create an account. The password is hashed here; storage never sees
    /// plaintext.
    ///
    /// # Errors
    /// `AlreadyExists` when handle or email is taken.
    pub async fn register(
        &self,
        handle: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Uuid, AuthError> {
        let password_hash = password::hash(password)?;
        match self
            .store
            .create(NewAccount {
                username: handle.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await?
        {
            CreateOutcome::Created(id) => Ok(id),
            CreateOutcome::Conflict => Err(AuthError::AlreadyExists),
        }
    }

    /// Start TOTP enrollment: generate a secret and hold it pending. Nothing
    /// is committed to the account until one valid code proves the user
    /// captured the secret.
    ///
    /// # Errors
    /// `Internal` when secret generation fails.
    pub async fn begin_mfa_enrollment(
        &self,
        account_id: Uuid,
        username: &str,
    ) -> Result<(Uuid, GeneratedSecret), AuthError> {
        let generated = self.totp.generate(username)?;
        let enrollment_id = self
            .enrollments
            .insert(PendingEnrollment {
                account_id,
                secret_base32: generated.secret_base32.clone(),
            })
            .await;
        Ok((enrollment_id, generated))
    }

    /// Finish TOTP enrollment: exactly one valid code commits the pending
    /// secret and flips the MFA flag, in a single store write.
    ///
    /// # Errors
    /// `ChallengeExpired` when no pending enrollment matches the caller,
    /// `MfaInvalid` on a wrong code (the enrollment stays pending for
    /// another try), `Internal` on store failure.
    pub async fn confirm_mfa_enrollment(
        &self,
        enrollment_id: Uuid,
        account_id: Uuid,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(pending) = self.enrollments.get(enrollment_id).await else {
            return Err(AuthError::ChallengeExpired);
        };
        if pending.account_id != account_id {
            return Err(AuthError::ChallengeExpired);
        }

        if !self.totp.verify(&pending.secret_base32, code, now)? {
            return Err(AuthError::MfaInvalid);
        }

        let updated = self
            .store
            .update_security_fields(account_id, SecurityUpdate::commit_mfa(pending.secret_base32))
            .await?;
        if !updated {
            return Err(AuthError::Internal(anyhow!(
                "account disappeared during MFA enrollment"
            )));
        }
        self.enrollments.remove(enrollment_id).await;
        Ok(())
    }

    /// Disable MFA: flag and secret are cleared together, keeping the
    /// "secret present iff enabled" invariant.
    ///
    /// # Errors
    /// `Internal` when the account does not exist or the store fails.
    pub async fn disable_mfa(&self, account_id: Uuid) -> Result<(), AuthError> {
        let updated = self
            .store
            .update_security_fields(account_id, SecurityUpdate::disable_mfa())
            .await?;
        if !updated {
            return Err(AuthError::Internal(anyhow!("account not found")));
        }
        Ok(())
    }

    /// Set a new password. Always re-hashes with a fresh salt; the explicit
    /// path is the only way a password value reaches storage.
    ///
    /// # Errors
    /// `Internal` when hashing fails or the account does not exist.
    pub async fn set_password(&self, account_id: Uuid, plaintext: &str) -> Result<(), AuthError> {
        let password_hash = password::hash(plaintext)?;
        let updated = self.store.set_password_hash(account_id, &password_hash).await?;
        if !updated {
            return Err(AuthError::Internal(anyhow!("account not found")));
        }
        Ok(())
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::lockout::LockoutState;
    use crate::account::store::memory::MemoryCredentialStore;
    use crate::account::store::Account;
    use chrono::TimeZone;

    const PASSWORD: &str = "summit pass 9";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn account(name: &str) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: password::hash(PASSWORD).unwrap(),
            role: Role::User,
            login_attempts: 0,
            lock_until: None,
            mfa_enabled: false,
            mfa_secret: None,
            created_at: at(0),
        }
    }

    fn flow_for(account: Account) -> (AuthFlow<MemoryCredentialStore>, Uuid) {
        let id = account.id;
        let flow = AuthFlow::new(
            MemoryCredentialStore::with_account(account),
            LockoutPolicy::default(),
            TotpEngine::new("MountainAuth".to_string()),
        );
        (flow, id)
    }

    #[tokio::test]
    async fn correct_password_authenticates_and_resets_counter() {
        let mut acct = account("alice");
        acct.login_attempts = 3;
        let (flow, id) = flow_for(acct);

        let outcome = flow.login("alice", PASSWORD, at(0)).await.unwrap();
        match outcome {
            LoginOutcome::Authenticated(claims) => {
                assert_eq!(claims.username, "alice");
                assert_eq!(claims.role, Role::User);
            }
            LoginOutcome::MfaPending { .. } => panic!("MFA is disabled for alice"),
        }
        let stored = flow.store().get(id).unwrap();
        assert_eq!(stored.login_attempts, 0);
        assert_eq!(stored.lock_until, None);
    }

    #[tokio::test]
    async fn unknown_handle_reads_like_wrong_password() {
        let (flow, _) = flow_for(account("alice"));

        let missing = flow.login("mallory", PASSWORD, at(0)).await.unwrap_err();
        let mismatch = flow.login("alice", "wrong", at(0)).await.unwrap_err();
        assert_eq!(missing.to_string(), mismatch.to_string());
    }

    #[tokio::test]
    async fn failed_attempts_increment_by_exactly_one() {
        let (flow, id) = flow_for(account("alice"));

        for expected in 1..=4 {
            let err = flow.login("alice", "wrong", at(0)).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(flow.store().get(id).unwrap().login_attempts, expected);
            assert_eq!(flow.store().get(id).unwrap().lock_until, None);
        }
    }

    #[tokio::test]
    async fn fifth_failure_triggers_lockout_with_distinct_outcome() {
        let mut acct = account("bob");
        acct.login_attempts = 4;
        let (flow, id) = flow_for(acct);

        let err = flow.login("bob", "wrong", at(0)).await.unwrap_err();
        match err {
            AuthError::LockoutTriggered { retry_after } => {
                assert_eq!(retry_after, chrono::Duration::minutes(30));
            }
            other => panic!("expected LockoutTriggered, got {other:?}"),
        }
        let stored = flow.store().get(id).unwrap();
        assert_eq!(stored.login_attempts, 5);
        assert_eq!(stored.lock_until, Some(at(30 * 60)));
    }

    #[tokio::test]
    async fn locked_account_rejects_without_invoking_hasher() {
        let mut acct = account("carol");
        acct.login_attempts = 5;
        acct.lock_until = Some(at(30 * 60));
        // If the hasher ran it would error on this non-PHC value; the lock
        // pre-check must reject first.
        acct.password_hash = "not a real hash".to_string();
        let (flow, id) = flow_for(acct);

        let err = flow.login("carol", PASSWORD, at(10 * 60)).await.unwrap_err();
        match err {
            AuthError::AccountLocked { remaining } => {
                assert_eq!(remaining, chrono::Duration::minutes(20));
            }
            other => panic!("expected AccountLocked, got {other:?}"),
        }
        // Counter untouched while locked.
        assert_eq!(flow.store().get(id).unwrap().login_attempts, 5);
    }

    #[tokio::test]
    async fn expired_lock_admits_a_correct_password() {
        let mut acct = account("carol");
        acct.login_attempts = 5;
        acct.lock_until = Some(at(30 * 60));
        let (flow, id) = flow_for(acct);

        let outcome = flow.login("carol", PASSWORD, at(31 * 60)).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Authenticated(_)));
        assert_eq!(flow.store().get(id).unwrap().login_attempts, 0);
    }

    #[tokio::test]
    async fn failure_after_expired_lock_starts_a_fresh_window() {
        let mut acct = account("carol");
        acct.login_attempts = 5;
        acct.lock_until = Some(at(30 * 60));
        let (flow, id) = flow_for(acct);

        let err = flow.login("carol", "wrong", at(31 * 60)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let stored = flow.store().get(id).unwrap();
        assert_eq!(stored.login_attempts, 1);
        assert_eq!(stored.lock_until, None);
    }

    #[tokio::test]
    async fn mfa_login_defers_counter_reset_until_code_passes() {
        let engine = TotpEngine::new("MountainAuth".to_string());
        let generated = engine.generate("dana").unwrap();
        let mut acct = account("dana");
        acct.login_attempts = 2;
        acct.mfa_enabled = true;
        acct.mfa_secret = Some(generated.secret_base32.clone());
        let (flow, id) = flow_for(acct);

        let outcome = flow.login("dana", PASSWORD, at(0)).await.unwrap();
        let challenge_id = match outcome {
            LoginOutcome::MfaPending { challenge_id } => challenge_id,
            LoginOutcome::Authenticated(_) => panic!("MFA should be pending"),
        };
        // Password alone must not reset the counter.
        assert_eq!(flow.store().get(id).unwrap().login_attempts, 2);

        // Wrong code: challenge stays open, counter stays put.
        let err = flow.verify_mfa(challenge_id, "000000", at(5)).await.unwrap_err();
        assert!(matches!(err, AuthError::MfaInvalid));
        assert_eq!(flow.store().get(id).unwrap().login_attempts, 2);

        // Right code on the same challenge: authenticated, counter reset.
        let code = engine.expected_code(&generated.secret_base32, at(10)).unwrap();
        let claims = flow.verify_mfa(challenge_id, &code, at(10)).await.unwrap();
        assert_eq!(claims.username, "dana");
        assert_eq!(flow.store().get(id).unwrap().login_attempts, 0);

        // The challenge was consumed by success; a replay must restart.
        let replay = flow.verify_mfa(challenge_id, &code, at(15)).await.unwrap_err();
        assert!(matches!(replay, AuthError::ChallengeExpired));
    }

    #[tokio::test]
    async fn abandoned_challenge_cannot_be_satisfied_later() {
        let engine = TotpEngine::new("MountainAuth".to_string());
        let generated = engine.generate("dana").unwrap();
        let mut acct = account("dana");
        acct.mfa_enabled = true;
        acct.mfa_secret = Some(generated.secret_base32.clone());
        let (flow, _) = flow_for(acct);

        let LoginOutcome::MfaPending { challenge_id } =
            flow.login("dana", PASSWORD, at(0)).await.unwrap()
        else {
            panic!("MFA should be pending");
        };
        flow.abandon_challenge(challenge_id).await;

        let code = engine.expected_code(&generated.secret_base32, at(5)).unwrap();
        let err = flow.verify_mfa(challenge_id, &code, at(5)).await.unwrap_err();
        assert!(matches!(err, AuthError::ChallengeExpired));
    }

    #[tokio::test]
    async fn enrollment_commits_only_after_one_valid_code() {
        let (flow, id) = flow_for(account("erin"));

        let (enrollment_id, generated) = flow.begin_mfa_enrollment(id, "erin").await.unwrap();
        // Generated but unproven: nothing committed.
        let stored = flow.store().get(id).unwrap();
        assert!(!stored.mfa_enabled);
        assert_eq!(stored.mfa_secret, None);

        // Wrong code keeps the enrollment pending and uncommitted.
        let err = flow
            .confirm_mfa_enrollment(enrollment_id, id, "000000", at(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MfaInvalid));
        assert!(!flow.store().get(id).unwrap().mfa_enabled);

        // One valid code commits the secret and flips the flag.
        let engine = TotpEngine::new("MountainAuth".to_string());
        let code = engine.expected_code(&generated.secret_base32, at(10)).unwrap();
        flow.confirm_mfa_enrollment(enrollment_id, id, &code, at(10))
            .await
            .unwrap();
        let stored = flow.store().get(id).unwrap();
        assert!(stored.mfa_enabled);
        assert_eq!(stored.mfa_secret.as_deref(), Some(generated.secret_base32.as_str()));
    }

    #[tokio::test]
    async fn enrollment_is_bound_to_the_enrolling_account() {
        let (flow, id) = flow_for(account("erin"));
        let (enrollment_id, generated) = flow.begin_mfa_enrollment(id, "erin").await.unwrap();

        let engine = TotpEngine::new("MountainAuth".to_string());
        let code = engine.expected_code(&generated.secret_base32, at(0)).unwrap();
        let err = flow
            .confirm_mfa_enrollment(enrollment_id, Uuid::new_v4(), &code, at(0))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ChallengeExpired));
    }

    #[tokio::test]
    async fn disable_mfa_clears_secret_and_flag_together() {
        let mut acct = account("frank");
        acct.mfa_enabled = true;
        acct.mfa_secret = Some("JBSWY3DPEHPK3PXP".to_string());
        let (flow, id) = flow_for(acct);

        flow.disable_mfa(id).await.unwrap();
        let stored = flow.store().get(id).unwrap();
        assert!(!stored.mfa_enabled);
        assert_eq!(stored.mfa_secret, None);
    }

    #[tokio::test]
    async fn register_hashes_and_rejects_duplicates() {
        let (flow, _) = flow_for(account("alice"));

        let id = flow
            .register("grace", "grace@example.com", "p4ssword!", Role::User)
            .await
            .unwrap();
        let stored = flow.store().get(id).unwrap();
        assert_ne!(stored.password_hash, "p4ssword!");
        assert!(password::verify("p4ssword!", &stored.password_hash).unwrap());

        let err = flow
            .register("grace", "other@example.com", "p4ssword!", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
    }

    #[tokio::test]
    async fn set_password_rehashes_with_fresh_salt() {
        let (flow, id) = flow_for(account("alice"));
        let before = flow.store().get(id).unwrap().password_hash;

        flow.set_password(id, PASSWORD).await.unwrap();
        let after = flow.store().get(id).unwrap().password_hash;
        assert_ne!(before, after);
        assert!(password::verify(PASSWORD, &after).unwrap());
    }

    #[test]
    fn default_policy_matches_documented_constants() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.lock_duration(), chrono::Duration::minutes(30));
        assert!(!policy.is_locked(&LockoutState::new(), at(0)));
    }
}
