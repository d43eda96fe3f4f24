//! Login and MFA challenge endpoints.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use crate::account::{LoginOutcome, SessionClaims};

use super::auth_error_response;
use super::session::{clear_mfa_cookie, extract_mfa_challenge, mfa_cookie, session_cookie};
use super::state::AuthState;
use super::storage::insert_session;
use super::types::{LoginRequest, LoginResponse, MfaVerifyRequest, SessionUser};
use super::utils::{generate_session_token, hash_session_token, normalize_handle};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, or MFA challenge issued", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
        (status = 423, description = "Account locked")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let username = normalize_handle(&request.username);
    if username.is_empty() || request.password.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing username or password").into_response();
    }

    // A fresh login invalidates any challenge the caller was still holding,
    // so a stale challenge for a previous handle can never be satisfied.
    if let Some(challenge_id) = extract_mfa_challenge(&headers) {
        auth_state.flow().abandon_challenge(challenge_id).await;
    }

    match auth_state.flow().login(&username, &request.password, Utc::now()).await {
        Ok(LoginOutcome::Authenticated(claims)) => {
            issue_session(&pool, &auth_state, claims).await
        }
        Ok(LoginOutcome::MfaPending { challenge_id }) => {
            let Ok(cookie) = mfa_cookie(auth_state.config(), challenge_id) else {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };
            let mut response_headers = HeaderMap::new();
            response_headers.insert(SET_COOKIE, cookie);
            (
                StatusCode::OK,
                response_headers,
                Json(LoginResponse {
                    mfa_required: true,
                    user: None,
                }),
            )
                .into_response()
        }
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/verify",
    request_body = MfaVerifyRequest,
    responses(
        (status = 200, description = "Second factor accepted", body = LoginResponse),
        (status = 401, description = "Invalid code or no pending challenge")
    ),
    tag = "auth"
)]
pub async fn mfa_verify(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<MfaVerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    // No challenge cookie means the caller must restart from the password
    // step; same response as an expired challenge.
    let Some(challenge_id) = extract_mfa_challenge(&headers) else {
        return (StatusCode::UNAUTHORIZED, "Verification expired; start over").into_response();
    };

    match auth_state
        .flow()
        .verify_mfa(challenge_id, &request.code, Utc::now())
        .await
    {
        Ok(claims) => issue_session(&pool, &auth_state, claims).await,
        Err(err) => auth_error_response(err),
    }
}

/// Mint a session for fully authenticated claims: random token, hashed at
/// rest, handed out once in an `HttpOnly` cookie. Clears any MFA cookie.
async fn issue_session(pool: &PgPool, auth_state: &AuthState, claims: SessionClaims) -> Response {
    let token = match generate_session_token() {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to generate session token: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let token_hash = hash_session_token(&token);
    let ttl = auth_state.config().session_ttl_seconds();
    if let Err(err) = insert_session(pool, &token_hash, claims.account_id, ttl).await {
        error!("Failed to persist session: {err}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut response_headers = HeaderMap::new();
    match session_cookie(auth_state.config(), &token) {
        Ok(cookie) => response_headers.append(SET_COOKIE, cookie),
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Ok(cookie) = clear_mfa_cookie(auth_state.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }

    info!(username = %claims.username, "login complete");
    (
        StatusCode::OK,
        response_headers,
        Json(LoginResponse {
            mfa_required: false,
            user: Some(SessionUser {
                id: claims.account_id.to_string(),
                username: claims.username,
                role: claims.role,
            }),
        }),
    )
        .into_response()
}
