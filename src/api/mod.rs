//! HTTP server assembly: routes, middleware and the Postgres pool.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub(crate) mod handlers;
mod openapi;

pub use handlers::auth::{AuthConfig, AuthState};

use handlers::{admin, auth, health, profile, scripts};

/// All documented routes. Kept separate from [`new`] so tests can mount the
/// router without binding a socket.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/openapi.json", get(openapi::serve))
        .route("/v1/auth/register", post(auth::register::register))
        .route("/v1/auth/login", post(auth::login::login))
        .route("/v1/auth/mfa/verify", post(auth::login::mfa_verify))
        .route("/v1/auth/session", get(auth::session::session))
        .route("/v1/auth/logout", post(auth::session::logout))
        .route("/v1/auth/mfa/enroll/start", post(auth::mfa::enroll_start))
        .route("/v1/auth/mfa/enroll/finish", post(auth::mfa::enroll_finish))
        .route("/v1/auth/mfa/disable", post(auth::mfa::disable))
        .route("/v1/profile/password", post(profile::change_password))
        .route("/v1/admin/stats", get(admin::stats))
        .route(
            "/v1/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/v1/admin/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route("/v1/admin/users/{id}/unlock", post(admin::unlock_user))
        .route("/v1/scripts", get(scripts::list).post(scripts::create))
        .route(
            "/v1/scripts/{id}",
            put(scripts::update).delete(scripts::remove),
        )
        .route("/v1/scripts/{id}/run", post(scripts::run))
        .route("/v1/scripts/{id}/executions", get(scripts::executions))
}

/// Start the server.
///
/// # Errors
/// Returns an error if the database is unreachable or the listener cannot
/// bind.
pub async fn new(port: u16, dsn: String, auth_config: AuthConfig) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth_state = Arc::new(AuthState::new(auth_config, pool.clone()));

    let app = router().layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(auth_state))
            .layer(Extension(pool)),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
