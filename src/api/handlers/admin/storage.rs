//! Admin queries over the users table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::auth::is_unique_violation;

use super::types::AdminUser;

fn admin_user_from_row(row: &sqlx::postgres::PgRow) -> AdminUser {
    let id: Uuid = row.get("id");
    let lock_until: Option<DateTime<Utc>> = row.get("lock_until");
    AdminUser {
        id: id.to_string(),
        username: row.get("username"),
        email: row.get("email"),
        role: row.get("role"),
        mfa_enabled: row.get("mfa_enabled"),
        login_attempts: row.get("login_attempts"),
        locked: lock_until.is_some_and(|until| until > Utc::now()),
        created_at: row.get("created_at"),
    }
}

pub(crate) async fn count_users(pool: &PgPool) -> Result<(i64, i64)> {
    let query = r"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE role = 'admin') AS admins
        FROM users
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(query)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to count users")?;
    Ok((row.get("total"), row.get("admins")))
}

pub(crate) async fn recent_users(pool: &PgPool, limit: i64) -> Result<Vec<AdminUser>> {
    let query = r"
        SELECT id, username, email, role, mfa_enabled, login_attempts, lock_until, created_at
        FROM users
        ORDER BY created_at DESC
        LIMIT $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(query)
        .bind(limit)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list recent users")?;
    Ok(rows.iter().map(admin_user_from_row).collect())
}

pub(crate) async fn list_users(pool: &PgPool) -> Result<Vec<AdminUser>> {
    let query = r"
        SELECT id, username, email, role, mfa_enabled, login_attempts, lock_until, created_at
        FROM users
        ORDER BY created_at DESC
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(query)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list users")?;
    Ok(rows.iter().map(admin_user_from_row).collect())
}

pub(crate) enum UpdateUserOutcome {
    Updated,
    NotFound,
    Conflict,
}

pub(crate) async fn update_user(
    pool: &PgPool,
    id: Uuid,
    username: Option<&str>,
    email: Option<&str>,
    role: Option<&str>,
) -> Result<UpdateUserOutcome> {
    let query = r"
        UPDATE users SET
            username = COALESCE($2, username),
            email    = COALESCE($3, email),
            role     = COALESCE($4, role)
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(role)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(result) if result.rows_affected() > 0 => Ok(UpdateUserOutcome::Updated),
        Ok(_) => Ok(UpdateUserOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(UpdateUserOutcome::Conflict),
        Err(err) => Err(err).context("failed to update user"),
    }
}

pub(crate) async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE"
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user")?;
    Ok(result.rows_affected() > 0)
}
