//! Router assembly and server startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{
    ActivityLog, AuthConfig, AuthService, PasswordResetService, SessionStore, UserStore, sweeper,
};
use crate::db;

pub mod handlers;
mod openapi;

use handlers::AppState;

/// Connect, migrate, seed, spawn the sweeper, and serve until shutdown.
pub async fn serve(port: u16, dsn: String, auth_config: AuthConfig) -> Result<()> {
    let pool = db::connect(&dsn).await?;
    db::migrate(&pool).await?;
    db::seed(&pool, &auth_config).await?;

    let users = UserStore::new(pool.clone());
    let sessions = SessionStore::new(pool.clone());
    let activity = ActivityLog::new(pool.clone());
    let resets = PasswordResetService::new(
        pool.clone(),
        users.clone(),
        activity.clone(),
        auth_config.clone(),
    );
    let auth = AuthService::new(
        users.clone(),
        sessions.clone(),
        activity.clone(),
        auth_config.clone(),
    );

    // Maintenance runs on its own timer, decoupled from request handling.
    sweeper::spawn_sweeper(
        sessions.clone(),
        resets.clone(),
        Duration::from_secs(auth_config.sweep_interval_seconds()),
    );

    let state = Arc::new(AppState {
        auth,
        resets,
        users,
        sessions,
        activity,
    });

    let origin = frontend_origin(auth_config.frontend_base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/auth/login", post(handlers::session::login))
        .route("/v1/auth/logout", post(handlers::session::logout))
        .route("/v1/auth/session", get(handlers::session::session))
        .route("/v1/auth/password", post(handlers::password::change_password))
        .route("/v1/auth/reset/request", post(handlers::password::reset_request))
        .route("/v1/auth/reset/confirm", post(handlers::password::reset_confirm))
        .route(
            "/v1/users",
            get(handlers::users::list).post(handlers::users::create),
        )
        .route(
            "/v1/users/reset-password",
            post(handlers::users::bulk_reset_password),
        )
        .route(
            "/v1/users/:id",
            get(handlers::users::show)
                .put(handlers::users::update)
                .delete(handlers::users::delete),
        )
        .route(
            "/v1/users/:id/toggle-status",
            post(handlers::users::toggle_status),
        )
        .route(
            "/v1/users/:id/reset-password",
            post(handlers::users::reset_password),
        )
        .route("/v1/users/:id/activity", get(handlers::activity::for_user))
        .route(
            "/v1/users/:id/resets",
            get(handlers::activity::reset_events_for_user),
        )
        .route("/v1/activity", get(handlers::activity::recent))
        .route("/v1/resets", get(handlers::activity::reset_events))
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state))
                .layer(Extension(pool.clone())),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{port}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Gracefully shutdown");
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

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::frontend_origin;

    #[test]
    fn frontend_origin_strips_path_and_keeps_port() {
        let origin = frontend_origin("https://helm.example.com:8443/app/").unwrap();
        assert_eq!(origin.to_str().unwrap(), "https://helm.example.com:8443");
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
