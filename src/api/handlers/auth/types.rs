//! Request/response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::account::Role;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub role: Role,
}

/// Login outcome. When `mfa_required` is true the caller holds the challenge
/// cookie and must submit a code before a session exists.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub mfa_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MfaVerifyRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MfaEnrollStartResponse {
    pub enrollment_id: String,
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code_data_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MfaEnrollFinishRequest {
    pub enrollment_id: String,
    pub code: String,
}
