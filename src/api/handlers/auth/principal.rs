//! Authenticated principal extraction and role gating.

use axum::http::{HeaderMap, StatusCode};
use sqlx::PgPool;
use uuid::Uuid;

use crate::account::Role;

use super::session::authenticate_session;

/// Authenticated user context derived from the session cookie.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolve a session cookie into a principal, or 401 when there is none.
pub async fn require_auth(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    match authenticate_session(headers, pool).await {
        Ok(Some(record)) => Ok(Principal {
            account_id: record.user_id,
            username: record.username,
            role: record.role,
        }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(status) => Err(status),
    }
}

/// Like [`require_auth`], but 403 unless the principal is an admin.
pub async fn require_admin(headers: &HeaderMap, pool: &PgPool) -> Result<Principal, StatusCode> {
    let principal = require_auth(headers, pool).await?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
