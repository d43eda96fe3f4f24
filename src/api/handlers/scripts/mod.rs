//! Script inventory and execution endpoints.
//!
//! Listing and run requests need any authenticated session; mutations need
//! an admin. A run request only records a `pending` execution; nothing is
//! executed in-process.

mod storage;
pub(crate) mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use super::auth::principal::{require_admin, require_auth};
use storage::{ScriptUpdateOutcome, ScriptWriteOutcome};
use types::{
    CreateScriptRequest, RunScriptRequest, Script, ScriptExecution, UpdateScriptRequest,
};

const EXECUTION_HISTORY_LIMIT: i64 = 20;

fn valid_script_type(value: &str) -> bool {
    matches!(value, "python" | "bash")
}

#[utoipa::path(
    get,
    path = "/v1/scripts",
    responses(
        (status = 200, description = "Script inventory", body = [Script]),
        (status = 401, description = "Unauthorized")
    ),
    tag = "scripts"
)]
pub async fn list(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    // Admins see inactive scripts too.
    match storage::list_scripts(&pool, principal.is_admin()).await {
        Ok(scripts) => Json(scripts).into_response(),
        Err(err) => {
            error!("Failed to list scripts: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/scripts",
    request_body = CreateScriptRequest,
    responses(
        (status = 201, description = "Script registered"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Script name already exists")
    ),
    tag = "scripts"
)]
pub async fn create(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    payload: Option<Json<CreateScriptRequest>>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let name = request.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "Script name is required").into_response();
    }
    if !valid_script_type(&request.script_type) {
        return (StatusCode::BAD_REQUEST, "Script type must be python or bash").into_response();
    }
    let file_path = request.file_path.trim();
    if file_path.is_empty() {
        return (StatusCode::BAD_REQUEST, "Script file path is required").into_response();
    }

    match storage::create_script(
        &pool,
        name,
        request.description.as_deref().unwrap_or(""),
        &request.script_type,
        file_path,
        principal.account_id,
    )
    .await
    {
        Ok(ScriptWriteOutcome::Written(id)) => {
            info!(admin = %principal.username, script = %name, "script registered");
            (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response()
        }
        Ok(ScriptWriteOutcome::Conflict) => {
            (StatusCode::CONFLICT, "Script name already exists").into_response()
        }
        Err(err) => {
            error!("Failed to create script: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/v1/scripts/{id}",
    request_body = UpdateScriptRequest,
    responses(
        (status = 204, description = "Script updated"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such script"),
        (status = 409, description = "Script name already exists")
    ),
    tag = "scripts"
)]
pub async fn update(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateScriptRequest>>,
) -> Response {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    if let Some(value) = request.script_type.as_deref() {
        if !valid_script_type(value) {
            return (StatusCode::BAD_REQUEST, "Script type must be python or bash")
                .into_response();
        }
    }
    let name = request.name.as_deref().map(str::trim);
    if name == Some("") {
        return (StatusCode::BAD_REQUEST, "Script name is required").into_response();
    }

    match storage::update_script(
        &pool,
        id,
        name,
        request.description.as_deref(),
        request.script_type.as_deref(),
        request.file_path.as_deref().map(str::trim),
        request.is_active,
    )
    .await
    {
        Ok(ScriptUpdateOutcome::Updated) => StatusCode::NO_CONTENT.into_response(),
        Ok(ScriptUpdateOutcome::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Ok(ScriptUpdateOutcome::Conflict) => {
            (StatusCode::CONFLICT, "Script name already exists").into_response()
        }
        Err(err) => {
            error!("Failed to update script: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/scripts/{id}",
    responses(
        (status = 204, description = "Script deactivated"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such script")
    ),
    tag = "scripts"
)]
pub async fn remove(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    match storage::deactivate_script(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to deactivate script: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/scripts/{id}/run",
    request_body = RunScriptRequest,
    responses(
        (status = 202, description = "Execution recorded as pending"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such script"),
        (status = 409, description = "Script is inactive")
    ),
    tag = "scripts"
)]
pub async fn run(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RunScriptRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let script = match storage::find_script(&pool, id).await {
        Ok(Some(script)) => script,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to look up script: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !script.is_active {
        return (StatusCode::CONFLICT, "Script is inactive").into_response();
    }

    let parameters = payload
        .and_then(|Json(request)| request.parameters)
        .unwrap_or_else(|| serde_json::json!({}));

    match storage::insert_execution(&pool, id, principal.account_id, &parameters).await {
        Ok(execution_id) => {
            info!(user = %principal.username, script = %script.name, "script run requested");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({ "execution_id": execution_id, "status": "pending" })),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to record script execution: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/scripts/{id}/executions",
    responses(
        (status = 200, description = "Recent executions", body = [ScriptExecution]),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No such script")
    ),
    tag = "scripts"
)]
pub async fn executions(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(status) = require_auth(&headers, &pool).await {
        return status.into_response();
    }

    match storage::find_script(&pool, id).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to look up script: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match storage::recent_executions(&pool, id, EXECUTION_HISTORY_LIMIT).await {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            error!("Failed to list executions: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::valid_script_type;

    #[test]
    fn script_type_whitelist() {
        assert!(valid_script_type("python"));
        assert!(valid_script_type("bash"));
        assert!(!valid_script_type("powershell"));
        assert!(!valid_script_type(""));
    }
}
