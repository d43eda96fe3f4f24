//! Admin console endpoints. Every handler gates on an admin principal.
//!
//! User creation goes through the same registration flow as self-service
//! signup so password hashing never has a second code path.

mod storage;
pub(crate) mod types;

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::account::store::SecurityUpdate;
use crate::account::{CredentialStore, Role};

use super::auth::principal::require_admin;
use super::auth::{normalize_handle, valid_email, valid_handle, valid_password};
use super::auth::{auth_error_response, AuthState};
use storage::UpdateUserOutcome;
use types::{AdminUser, CreateUserRequest, StatsResponse, UpdateUserRequest};

const RECENT_USERS_LIMIT: i64 = 5;

#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    responses(
        (status = 200, description = "Aggregate user statistics", body = StatsResponse),
        (status = 403, description = "Admin role required")
    ),
    tag = "admin"
)]
pub async fn stats(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let (total, admins) = match storage::count_users(&pool).await {
        Ok(counts) => counts,
        Err(err) => {
            error!("Failed to count users: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let recent = match storage::recent_users(&pool, RECENT_USERS_LIMIT).await {
        Ok(users) => users,
        Err(err) => {
            error!("Failed to list recent users: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    Json(StatsResponse {
        total_users: total,
        admin_users: admins,
        regular_users: total - admins,
        recent_users: recent,
    })
    .into_response()
}

#[utoipa::path(
    get,
    path = "/v1/admin/users",
    responses(
        (status = 200, description = "All users", body = [AdminUser]),
        (status = 403, description = "Admin role required")
    ),
    tag = "admin"
)]
pub async fn list_users(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    match storage::list_users(&pool).await {
        Ok(users) => Json(users).into_response(),
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "admin"
)]
pub async fn create_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<CreateUserRequest>>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let username = normalize_handle(&request.username);
    if !valid_handle(&username) {
        return (
            StatusCode::BAD_REQUEST,
            "Username must be 3-30 characters (letters, digits, . _ -)",
        )
            .into_response();
    }
    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address").into_response();
    }
    if !valid_password(&request.password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters",
        )
            .into_response();
    }
    let role = match request.role.as_deref() {
        None | Some("") => Role::User,
        Some(value) => match Role::from_str(value) {
            Some(role) => role,
            None => return (StatusCode::BAD_REQUEST, "Invalid role").into_response(),
        },
    };

    match auth_state
        .flow()
        .register(&username, &email, &request.password, role)
        .await
    {
        Ok(id) => {
            info!(admin = %principal.username, user = %username, "admin created user");
            (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response()
        }
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    put,
    path = "/v1/admin/users/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "User updated"),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user"),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "admin"
)]
pub async fn update_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateUserRequest>>,
) -> Response {
    if let Err(status) = require_admin(&headers, &pool).await {
        return status.into_response();
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let username = request.username.as_deref().map(normalize_handle);
    if let Some(value) = username.as_deref() {
        if !valid_handle(value) {
            return (
                StatusCode::BAD_REQUEST,
                "Username must be 3-30 characters (letters, digits, . _ -)",
            )
                .into_response();
        }
        // Renaming onto a handle held by a different account is a conflict;
        // re-submitting the account's own handle is not.
        match auth_state
            .flow()
            .store()
            .find_by_handle_excluding(value, id)
            .await
        {
            Ok(Some(_)) => {
                return (StatusCode::CONFLICT, "Username or email already exists")
                    .into_response()
            }
            Ok(None) => {}
            Err(err) => {
                error!("Failed to check handle uniqueness: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }
    let email = request.email.as_deref().map(|value| value.trim().to_lowercase());
    if let Some(value) = email.as_deref() {
        if !valid_email(value) {
            return (StatusCode::BAD_REQUEST, "Invalid email address").into_response();
        }
    }
    let role = match request.role.as_deref() {
        None => None,
        Some(value) => match Role::from_str(value) {
            Some(role) => Some(role),
            None => return (StatusCode::BAD_REQUEST, "Invalid role").into_response(),
        },
    };

    match storage::update_user(
        &pool,
        id,
        username.as_deref(),
        email.as_deref(),
        role.map(Role::as_str),
    )
    .await
    {
        Ok(UpdateUserOutcome::Updated) => StatusCode::NO_CONTENT.into_response(),
        Ok(UpdateUserOutcome::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Ok(UpdateUserOutcome::Conflict) => {
            (StatusCode::CONFLICT, "Username or email already exists").into_response()
        }
        Err(err) => {
            error!("Failed to update user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/v1/admin/users/{id}",
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    ),
    tag = "admin"
)]
pub async fn delete_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    Path(id): Path<Uuid>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    // An admin deleting their own account would orphan the session mid-flight.
    if principal.account_id == id {
        return (StatusCode::BAD_REQUEST, "Cannot delete your own account").into_response();
    }

    match storage::delete_user(&pool, id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to delete user: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/admin/users/{id}/unlock",
    responses(
        (status = 204, description = "Lock cleared and counter reset"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    ),
    tag = "admin"
)]
pub async fn unlock_user(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let principal = match require_admin(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match auth_state
        .flow()
        .store()
        .update_security_fields(id, SecurityUpdate::unlock())
        .await
    {
        Ok(true) => {
            info!(admin = %principal.username, user_id = %id, "account unlocked");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to unlock account: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
