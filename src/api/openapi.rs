//! OpenAPI document for the HTTP surface.

use axum::response::Json;
use utoipa::OpenApi;

use crate::api::handlers::{admin, auth, health, profile, scripts};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "mountain-auth",
        description = "Session-based authentication and script management service"
    ),
    paths(
        health::health,
        auth::register::register,
        auth::login::login,
        auth::login::mfa_verify,
        auth::session::session,
        auth::session::logout,
        auth::mfa::enroll_start,
        auth::mfa::enroll_finish,
        auth::mfa::disable,
        profile::change_password,
        admin::stats,
        admin::list_users,
        admin::create_user,
        admin::update_user,
        admin::delete_user,
        admin::unlock_user,
        scripts::list,
        scripts::create,
        scripts::update,
        scripts::remove,
        scripts::run,
        scripts::executions,
    ),
    components(schemas(
        health::Health,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::SessionUser,
        auth::types::MfaVerifyRequest,
        auth::types::RegisterRequest,
        auth::types::RegisterResponse,
        auth::types::MfaEnrollStartResponse,
        auth::types::MfaEnrollFinishRequest,
        profile::ChangePasswordRequest,
        admin::types::AdminUser,
        admin::types::StatsResponse,
        admin::types::CreateUserRequest,
        admin::types::UpdateUserRequest,
        scripts::types::Script,
        scripts::types::CreateScriptRequest,
        scripts::types::UpdateScriptRequest,
        scripts::types::RunScriptRequest,
        scripts::types::ScriptExecution,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Login, MFA and sessions"),
        (name = "profile", description = "Self-service account settings"),
        (name = "admin", description = "User administration"),
        (name = "scripts", description = "Script inventory and execution records")
    )
)]
pub struct ApiDoc;

pub async fn serve() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
