//! Script inventory and execution-record queries.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::auth::is_unique_violation;

use super::types::{Script, ScriptExecution};

const SCRIPT_COLUMNS: &str =
    "id, name, description, script_type, file_path, is_active, created_by, created_at, updated_at";

fn script_from_row(row: &sqlx::postgres::PgRow) -> Script {
    let id: Uuid = row.get("id");
    let created_by: Uuid = row.get("created_by");
    Script {
        id: id.to_string(),
        name: row.get("name"),
        description: row.get("description"),
        script_type: row.get("script_type"),
        file_path: row.get("file_path"),
        is_active: row.get("is_active"),
        created_by: created_by.to_string(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn execution_from_row(row: &sqlx::postgres::PgRow) -> ScriptExecution {
    let id: Uuid = row.get("id");
    let script_id: Uuid = row.get("script_id");
    let user_id: Uuid = row.get("user_id");
    ScriptExecution {
        id: id.to_string(),
        script_id: script_id.to_string(),
        user_id: user_id.to_string(),
        parameters: row.get("parameters"),
        status: row.get("status"),
        output: row.get("output"),
        error: row.get("error"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
    }
}

pub(crate) async fn list_scripts(pool: &PgPool, include_inactive: bool) -> Result<Vec<Script>> {
    let query = format!(
        "SELECT {SCRIPT_COLUMNS} FROM scripts WHERE is_active OR $1 ORDER BY name"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(&query)
        .bind(include_inactive)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list scripts")?;
    Ok(rows.iter().map(script_from_row).collect())
}

pub(crate) async fn find_script(pool: &PgPool, id: Uuid) -> Result<Option<Script>> {
    let query = format!("SELECT {SCRIPT_COLUMNS} FROM scripts WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up script")?;
    Ok(row.as_ref().map(script_from_row))
}

pub(crate) enum ScriptWriteOutcome {
    Written(Uuid),
    Conflict,
}

pub(crate) async fn create_script(
    pool: &PgPool,
    name: &str,
    description: &str,
    script_type: &str,
    file_path: &str,
    created_by: Uuid,
) -> Result<ScriptWriteOutcome> {
    let query = r"
        INSERT INTO scripts (name, description, script_type, file_path, created_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(query)
        .bind(name)
        .bind(description)
        .bind(script_type)
        .bind(file_path)
        .bind(created_by)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(ScriptWriteOutcome::Written(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(ScriptWriteOutcome::Conflict),
        Err(err) => Err(err).context("failed to create script"),
    }
}

pub(crate) enum ScriptUpdateOutcome {
    Updated,
    NotFound,
    Conflict,
}

pub(crate) async fn update_script(
    pool: &PgPool,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
    script_type: Option<&str>,
    file_path: Option<&str>,
    is_active: Option<bool>,
) -> Result<ScriptUpdateOutcome> {
    let query = r"
        UPDATE scripts SET
            name        = COALESCE($2, name),
            description = COALESCE($3, description),
            script_type = COALESCE($4, script_type),
            file_path   = COALESCE($5, file_path),
            is_active   = COALESCE($6, is_active),
            updated_at  = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let result = sqlx::query(query)
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(script_type)
        .bind(file_path)
        .bind(is_active)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(result) if result.rows_affected() > 0 => Ok(ScriptUpdateOutcome::Updated),
        Ok(_) => Ok(ScriptUpdateOutcome::NotFound),
        Err(err) if is_unique_violation(&err) => Ok(ScriptUpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update script"),
    }
}

/// Soft-delete: the script stays for execution history, but disappears from
/// the default listing and rejects new runs.
pub(crate) async fn deactivate_script(pool: &PgPool, id: Uuid) -> Result<bool> {
    let query = "UPDATE scripts SET is_active = FALSE, updated_at = NOW() WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE"
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to deactivate script")?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn insert_execution(
    pool: &PgPool,
    script_id: Uuid,
    user_id: Uuid,
    parameters: &serde_json::Value,
) -> Result<Uuid> {
    let query = r"
        INSERT INTO script_executions (script_id, user_id, parameters)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT"
    );
    let row = sqlx::query(query)
        .bind(script_id)
        .bind(user_id)
        .bind(parameters)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to record script execution")?;
    Ok(row.get("id"))
}

pub(crate) async fn recent_executions(
    pool: &PgPool,
    script_id: Uuid,
    limit: i64,
) -> Result<Vec<ScriptExecution>> {
    let query = r"
        SELECT id, script_id, user_id, parameters, status, output, error, started_at, finished_at
        FROM script_executions
        WHERE script_id = $1
        ORDER BY started_at DESC
        LIMIT $2
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT"
    );
    let rows = sqlx::query(query)
        .bind(script_id)
        .bind(limit)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to list script executions")?;
    Ok(rows.iter().map(execution_from_row).collect())
}
