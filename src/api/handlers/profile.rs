//! Self-service profile endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::account::password;
use crate::account::CredentialStore;

use super::auth::principal::require_auth;
use super::auth::{auth_error_response, valid_password, AuthState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/v1/profile/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password incorrect"),
        (status = 400, description = "New password too weak")
    ),
    tag = "profile"
)]
pub async fn change_password(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ChangePasswordRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    if !valid_password(&request.new_password) {
        return (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters",
        )
            .into_response();
    }

    // The stored hash is fetched through the same boundary the flow uses.
    let account = match auth_state.flow().store().find_by_handle(&principal.username).await {
        Ok(Some(account)) => account,
        Ok(None) => return StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => {
            error!("Failed to load account for password change: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match password::verify(&request.current_password, &account.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return (StatusCode::UNAUTHORIZED, "Current password is incorrect").into_response()
        }
        Err(err) => {
            error!("Password verification failed: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match auth_state
        .flow()
        .set_password(principal.account_id, &request.new_password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(err),
    }
}
