//! Session endpoints and cookie plumbing.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::state::{AuthConfig, AuthState};
use super::storage::{delete_session, lookup_session, SessionRecord};
use super::types::SessionUser;
use super::utils::hash_session_token;

const SESSION_COOKIE_NAME: &str = "mountain_session";
const MFA_COOKIE_NAME: &str = "mountain_mfa";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionUser),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let token_hash = hash_session_token(&token);
    match lookup_session(&pool, &token_hash).await {
        Ok(Some(SessionRecord {
            user_id,
            username,
            role,
        })) => {
            let response = SessionUser {
                id: user_id.to_string(),
                username,
                role,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // A pending challenge dies with the session.
    if let Some(challenge_id) = extract_mfa_challenge(&headers) {
        auth_state.flow().abandon_challenge(challenge_id).await;
    }

    // Always clear the cookies, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(auth_state.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_mfa_cookie(auth_state.config()) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Resolve a session cookie into a session record, if present.
///
/// Returns `Ok(None)` when the cookie is missing or invalid.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    pool: &PgPool,
) -> Result<Option<SessionRecord>, StatusCode> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    let token_hash = hash_session_token(&token);
    match lookup_session(pool, &token_hash).await {
        Ok(record) => Ok(record),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    build_cookie(config, SESSION_COOKIE_NAME, token, ttl_seconds)
}

pub(super) fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, SESSION_COOKIE_NAME, "", 0)
}

/// Cookie holding the opaque MFA challenge id between the password step and
/// the code submission. Carries no account data.
pub(super) fn mfa_cookie(
    config: &AuthConfig,
    challenge_id: Uuid,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = i64::try_from(config.challenge_ttl_seconds()).unwrap_or(i64::MAX);
    build_cookie(config, MFA_COOKIE_NAME, &challenge_id.to_string(), ttl_seconds)
}

pub(super) fn clear_mfa_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, MFA_COOKIE_NAME, "", 0)
}

fn build_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, SESSION_COOKIE_NAME)
}

pub(super) fn extract_mfa_challenge(headers: &HeaderMap) -> Option<Uuid> {
    cookie_value(headers, MFA_COOKIE_NAME).and_then(|value| Uuid::parse_str(&value).ok())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn session_token_from_cookie() {
        let headers = headers_with_cookie("mountain_session=tok123; other=x");
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn bearer_beats_cookie() {
        let mut headers = headers_with_cookie("mountain_session=cookie-token");
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("header-token")
        );
    }

    #[test]
    fn empty_cookie_is_no_session() {
        let headers = headers_with_cookie("mountain_session=");
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn mfa_challenge_must_be_a_uuid() {
        let id = Uuid::new_v4();
        let headers = headers_with_cookie(&format!("mountain_mfa={id}"));
        assert_eq!(extract_mfa_challenge(&headers), Some(id));

        let headers = headers_with_cookie("mountain_mfa=not-a-uuid");
        assert_eq!(extract_mfa_challenge(&headers), None);
    }

    #[test]
    fn cookies_honor_secure_flag() {
        let config = AuthConfig::new().with_session_cookie_secure(true);
        let cookie = session_cookie(&config, "tok").unwrap();
        assert!(cookie.to_str().unwrap().contains("; Secure"));

        let config = AuthConfig::new();
        let cookie = session_cookie(&config, "tok").unwrap();
        assert!(!cookie.to_str().unwrap().contains("; Secure"));
    }

    #[test]
    fn clear_cookie_zeroes_max_age() {
        let config = AuthConfig::new();
        let cookie = clear_session_cookie(&config).unwrap();
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }
}
