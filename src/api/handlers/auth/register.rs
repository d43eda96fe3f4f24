//! Account registration.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::account::Role;

use super::auth_error_response;
use super::state::AuthState;
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{normalize_handle, valid_email, valid_handle, valid_password};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already exists")
    ),
    tag = "auth"
)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
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
        Ok(id) => (
            StatusCode::CREATED,
            Json(RegisterResponse { id: id.to_string() }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}
