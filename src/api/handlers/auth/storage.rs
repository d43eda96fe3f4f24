//! Postgres-backed credential store and session persistence.
//!
//! Counter/lock writes are single statements whose CASE arms mirror the pure
//! lockout policy, so concurrent failures against one account cannot
//! under-count and the threshold crossing is evaluated exactly once per
//! failure.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::account::lockout::{LockoutPolicy, LockoutState};
use crate::account::store::{
    Account, CreateOutcome, CredentialStore, NewAccount, Role, SecurityUpdate,
};

use super::utils::is_unique_violation;

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, role, login_attempts, \
                               lock_until, mfa_enabled, mfa_secret, created_at";

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<Account> {
    let role: String = row.get("role");
    Ok(Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from_str(&role).ok_or_else(|| anyhow!("unknown role in users row: {role}"))?,
        login_attempts: row.get("login_attempts"),
        lock_until: row.get("lock_until"),
        mfa_enabled: row.get("mfa_enabled"),
        mfa_secret: row.get("mfa_secret"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(&query)
            .bind(handle)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up account by handle")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_handle_excluding(&self, handle: &str, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = $1 AND id <> $2");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT"
        );
        let row = sqlx::query(&query)
            .bind(handle)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to check handle uniqueness")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT"
        );
        let row = sqlx::query(query)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(CreateOutcome::Created(row.get("id"))),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::Conflict),
            Err(err) => Err(err).context("failed to create account"),
        }
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> Result<LockoutState> {
        // Same transition as LockoutPolicy::record_failure, applied in one
        // statement: stale lock restarts the window at 1; otherwise the
        // counter increments and crossing the threshold arms the lock once.
        let query = r"
            UPDATE users SET
                login_attempts = CASE
                    WHEN lock_until IS NOT NULL AND lock_until <= $2 THEN 1
                    ELSE login_attempts + 1
                END,
                lock_until = CASE
                    WHEN lock_until IS NOT NULL AND lock_until <= $2 THEN NULL
                    WHEN lock_until IS NULL AND login_attempts + 1 >= $3 THEN $4
                    ELSE lock_until
                END
            WHERE id = $1
            RETURNING login_attempts, lock_until
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE"
        );
        let lock_candidate = now + policy.lock_duration();
        let row = sqlx::query(query)
            .bind(id)
            .bind(now)
            .bind(i32::try_from(policy.max_attempts()).unwrap_or(i32::MAX))
            .bind(lock_candidate)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to record login failure")?;

        Ok(LockoutState {
            attempt_count: row.get("login_attempts"),
            lock_until: row.get("lock_until"),
        })
    }

    async fn record_login_success(&self, id: Uuid) -> Result<()> {
        let query = "UPDATE users SET login_attempts = 0, lock_until = NULL WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE"
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to reset login attempts")?;
        Ok(())
    }

    async fn update_security_fields(&self, id: Uuid, update: SecurityUpdate) -> Result<bool> {
        // Flag parameters distinguish "leave untouched" from "set to NULL"
        // for the nullable columns.
        let query = r"
            UPDATE users SET
                login_attempts = COALESCE($2, login_attempts),
                lock_until     = CASE WHEN $3 THEN $4 ELSE lock_until END,
                mfa_enabled    = COALESCE($5, mfa_enabled),
                mfa_secret     = CASE WHEN $6 THEN $7 ELSE mfa_secret END
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE"
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(update.attempt_count)
            .bind(update.lock_until.is_some())
            .bind(update.lock_until.flatten())
            .bind(update.mfa_enabled)
            .bind(update.mfa_secret.is_some())
            .bind(update.mfa_secret.flatten())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update security fields")?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE"
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set password hash")?;
        Ok(result.rows_affected() > 0)
    }
}

/// Minimal data resolved from a valid session cookie.
#[derive(Clone, Debug)]
pub(crate) struct SessionRecord {
    pub(crate) user_id: Uuid,
    pub(crate) username: String,
    pub(crate) role: Role,
}

pub(crate) async fn insert_session(
    pool: &PgPool,
    token_hash: &[u8],
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO sessions (token_hash, user_id, expires_at)
        VALUES ($1, $2, NOW() + make_interval(secs => $3))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    sqlx::query(query)
        .bind(token_hash)
        .bind(user_id)
        .bind(ttl_seconds as f64)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert session")?;
    Ok(())
}

pub(crate) async fn lookup_session(pool: &PgPool, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT u.id, u.username, u.role
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = $1 AND s.expires_at > NOW()
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up session")?;

    row.map(|row| {
        let role: String = row.get("role");
        Ok(SessionRecord {
            user_id: row.get("id"),
            username: row.get("username"),
            role: Role::from_str(&role).ok_or_else(|| anyhow!("unknown role in users row: {role}"))?,
        })
    })
    .transpose()
}

pub(crate) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM sessions WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}
