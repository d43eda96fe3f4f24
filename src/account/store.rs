//! Credential store boundary.
//!
//! The flow controller only sees this trait; the Postgres implementation
//! lives with the HTTP storage layer. Counter and lock writes go through
//! [`CredentialStore::record_login_failure`], which implementations must
//! apply as a single atomic update so concurrent failures never under-count
//! (two racers both reading 4 and both writing 5).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::lockout::{LockoutPolicy, LockoutState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// One persisted account record. `password_hash` is always hasher output;
/// plaintext never reaches this type.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub login_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub mfa_enabled: bool,
    pub mfa_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub fn lockout_state(&self) -> LockoutState {
        LockoutState {
            attempt_count: self.login_attempts,
            lock_until: self.lock_until,
        }
    }
}

/// Input for account creation. The hash is computed by the flow controller
/// before this struct exists.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Outcome of an insert attempt against the unique handle/email columns.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Uuid),
    Conflict,
}

/// Partial update of the security fields. `None` leaves a field untouched;
/// the double options distinguish "leave alone" from "clear".
#[derive(Clone, Debug, Default)]
pub struct SecurityUpdate {
    pub attempt_count: Option<i32>,
    pub lock_until: Option<Option<DateTime<Utc>>>,
    pub mfa_enabled: Option<bool>,
    pub mfa_secret: Option<Option<String>>,
}

impl SecurityUpdate {
    /// Commit a proven enrollment secret and flip MFA on, in one write.
    #[must_use]
    pub fn commit_mfa(secret_base32: String) -> Self {
        Self {
            mfa_enabled: Some(true),
            mfa_secret: Some(Some(secret_base32)),
            ..Self::default()
        }
    }

    /// Tear MFA down: flag off and secret cleared together.
    #[must_use]
    pub fn disable_mfa() -> Self {
        Self {
            mfa_enabled: Some(false),
            mfa_secret: Some(None),
            ..Self::default()
        }
    }

    /// Administrative unlock: counter to zero, lock cleared.
    #[must_use]
    pub fn unlock() -> Self {
        Self {
            attempt_count: Some(0),
            lock_until: Some(None),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>>;

    /// Uniqueness lookup that ignores the given account, for admin renames.
    async fn find_by_handle_excluding(&self, handle: &str, id: Uuid) -> Result<Option<Account>>;

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    /// Apply the lockout policy's failure transition atomically and return
    /// the resulting state.
    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> Result<LockoutState>;

    /// Reset counter and lock after a fully completed authentication.
    async fn record_login_success(&self, id: Uuid) -> Result<()>;

    /// Partial update of counter/lock/MFA fields. `false` when the account
    /// does not exist.
    async fn update_security_fields(&self, id: Uuid, update: SecurityUpdate) -> Result<bool>;

    /// Replace the password hash. Callers hash first; plaintext never takes
    /// this path.
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store for flow tests. Mirrors the Postgres implementation
    //! by delegating the failure transition to the pure policy under one
    //! lock.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryCredentialStore {
        accounts: Mutex<HashMap<Uuid, Account>>,
    }

    impl MemoryCredentialStore {
        pub fn with_account(account: Account) -> Self {
            let store = Self::default();
            store
                .accounts
                .lock()
                .unwrap()
                .insert(account.id, account);
            store
        }

        pub fn get(&self, id: Uuid) -> Option<Account> {
            self.accounts.lock().unwrap().get(&id).cloned()
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .find(|account| account.username == handle)
                .cloned())
        }

        async fn find_by_handle_excluding(
            &self,
            handle: &str,
            id: Uuid,
        ) -> Result<Option<Account>> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .values()
                .find(|account| account.username == handle && account.id != id)
                .cloned())
        }

        async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
            let mut accounts = self.accounts.lock().unwrap();
            let conflict = accounts
                .values()
                .any(|existing| existing.username == account.username || existing.email == account.email);
            if conflict {
                return Ok(CreateOutcome::Conflict);
            }
            let id = Uuid::new_v4();
            accounts.insert(
                id,
                Account {
                    id,
                    username: account.username,
                    email: account.email,
                    password_hash: account.password_hash,
                    role: account.role,
                    login_attempts: 0,
                    lock_until: None,
                    mfa_enabled: false,
                    mfa_secret: None,
                    created_at: Utc::now(),
                },
            );
            Ok(CreateOutcome::Created(id))
        }

        async fn record_login_failure(
            &self,
            id: Uuid,
            now: DateTime<Utc>,
            policy: &LockoutPolicy,
        ) -> Result<LockoutState> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| anyhow::anyhow!("account not found"))?;
            let updated = policy.record_failure(&account.lockout_state(), now);
            account.login_attempts = updated.attempt_count;
            account.lock_until = updated.lock_until;
            Ok(updated)
        }

        async fn record_login_success(&self, id: Uuid) -> Result<()> {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&id)
                .ok_or_else(|| anyhow::anyhow!("account not found"))?;
            account.login_attempts = 0;
            account.lock_until = None;
            Ok(())
        }

        async fn update_security_fields(&self, id: Uuid, update: SecurityUpdate) -> Result<bool> {
            let mut accounts = self.accounts.lock().unwrap();
            let Some(account) = accounts.get_mut(&id) else {
                return Ok(false);
            };
            if let Some(attempts) = update.attempt_count {
                account.login_attempts = attempts;
            }
            if let Some(lock_until) = update.lock_until {
                account.lock_until = lock_until;
            }
            if let Some(enabled) = update.mfa_enabled {
                account.mfa_enabled = enabled;
            }
            if let Some(secret) = update.mfa_secret {
                account.mfa_secret = secret;
            }
            Ok(true)
        }

        async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
            let mut accounts = self.accounts.lock().unwrap();
            let Some(account) = accounts.get_mut(&id) else {
                return Ok(false);
            };
            account.password_hash = password_hash.to_string();
            Ok(true)
        }
    }
}
