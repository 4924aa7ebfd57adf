//! Login, logout, and current-session endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Extension},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::{AuthConfig, User};

use super::{
    AppState, SESSION_COOKIE_NAME, client_ip, error_response, extract_session_token, user_agent,
};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
}

#[derive(serde::Serialize, ToSchema)]
pub struct LoginResponse {
    /// Opaque bearer token; shown once, never retrievable again.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

#[derive(serde::Serialize, ToSchema)]
pub struct SessionResponse {
    pub user: User,
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = super::ErrorBody),
        (status = 403, description = "Password has expired", body = super::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let ip = client_ip(&headers, addr);
    let agent = user_agent(&headers);

    match state
        .auth
        .login(&request.email, &request.password, &ip, &agent)
        .await
    {
        Ok(outcome) => {
            let mut response_headers = HeaderMap::new();
            if let Ok(cookie) = session_cookie(state.auth.config(), &outcome.token) {
                response_headers.insert(SET_COOKIE, cookie);
            }
            (
                StatusCode::OK,
                response_headers,
                Json(LoginResponse {
                    token: outcome.token,
                    expires_at: outcome.session.expires_at,
                    user: outcome.user,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session destroyed"),
        (status = 401, description = "No such session", body = super::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn logout(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    // Always clear the cookie, even when the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.auth.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let Some(token) = extract_session_token(&headers) else {
        let body = error_response(&crate::auth::AuthError::InvalidSession);
        return (response_headers, body).into_response();
    };

    let ip = client_ip(&headers, addr);
    let agent = user_agent(&headers);

    match state.auth.logout(&token, &ip, &agent).await {
        Ok(()) => (StatusCode::NO_CONTENT, response_headers).into_response(),
        Err(err) => (response_headers, error_response(&err)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active; expiry slides forward", body = SessionResponse),
        (status = 401, description = "Invalid or expired session", body = super::ErrorBody)
    ),
    tag = "auth"
)]
pub async fn session(state: Extension<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = extract_session_token(&headers) else {
        return error_response(&crate::auth::AuthError::InvalidOrExpiredSession);
    };

    match state.auth.resolve_user(&token).await {
        Ok(user) => (StatusCode::OK, Json(SessionResponse { user })).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Build a `HttpOnly` cookie carrying the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;

    #[test]
    fn session_cookie_carries_ttl_and_flags() {
        let config = AuthConfig::default();
        let cookie = session_cookie(&config, "tok").unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("helmgate_session=tok;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(value.contains("Max-Age=1800"));
        assert!(!value.contains("Secure"));
    }

    #[test]
    fn session_cookie_is_secure_behind_https() {
        let config = AuthConfig::new("https://helm.example.com".to_string());
        let cookie = session_cookie(&config, "tok").unwrap();
        assert!(cookie.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let config = AuthConfig::default();
        let cookie = clear_session_cookie(&config).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("helmgate_session=;"));
        assert!(value.contains("Max-Age=0"));
    }
}
