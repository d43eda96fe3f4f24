//! TOTP enrollment endpoints.
//!
//! Enrollment is two-phase: `start` generates a secret the user scans, held
//! server-side in a pending state; `finish` commits it to the account only
//! once one valid code proves the authenticator captured it.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::auth_error_response;
use super::principal::require_auth;
use super::state::AuthState;
use super::types::{MfaEnrollFinishRequest, MfaEnrollStartResponse};

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/enroll/start",
    responses(
        (status = 200, description = "Enrollment started", body = MfaEnrollStartResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn enroll_start(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match auth_state
        .flow()
        .begin_mfa_enrollment(principal.account_id, &principal.username)
        .await
    {
        Ok((enrollment_id, generated)) => (
            StatusCode::OK,
            Json(MfaEnrollStartResponse {
                enrollment_id: enrollment_id.to_string(),
                secret: generated.secret_base32,
                otpauth_url: generated.otpauth_url,
                qr_code_data_url: generated.qr_code_data_url,
            }),
        )
            .into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/enroll/finish",
    request_body = MfaEnrollFinishRequest,
    responses(
        (status = 204, description = "MFA enabled"),
        (status = 401, description = "Invalid code or expired enrollment")
    ),
    tag = "auth"
)]
pub async fn enroll_finish(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<MfaEnrollFinishRequest>>,
) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };

    let Ok(enrollment_id) = Uuid::parse_str(&request.enrollment_id) else {
        return (StatusCode::BAD_REQUEST, "Invalid enrollment id").into_response();
    };

    match auth_state
        .flow()
        .confirm_mfa_enrollment(enrollment_id, principal.account_id, &request.code, Utc::now())
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/disable",
    responses(
        (status = 204, description = "MFA disabled"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth"
)]
pub async fn disable(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &pool).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match auth_state.flow().disable_mfa(principal.account_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error_response(err),
    }
}
