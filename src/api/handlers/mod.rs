//! HTTP handlers: thin glue between transport and the auth core.

pub mod activity;
pub mod health;
pub mod password;
pub mod session;
pub mod users;

use std::net::SocketAddr;

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::{
    ActivityLog, AuthError, AuthService, PasswordResetService, Role, SessionStore, User, UserStore,
};

pub(crate) const SESSION_COOKIE_NAME: &str = "helmgate_session";

/// Everything the handlers need, built once at startup.
pub struct AppState {
    pub auth: AuthService,
    pub resets: PasswordResetService,
    pub users: UserStore,
    pub sessions: SessionStore,
    pub activity: ActivityLog,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Single shared error path.
///
/// Every credential failure renders the same body, and every session failure
/// (including a disabled owner) renders the same body, so responses cannot be
/// used to probe which check failed. Internal errors are logged server-side
/// and surface as an opaque 500.
pub(crate) fn error_response(err: &AuthError) -> Response {
    let (status, message) = match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid email or password"),
        AuthError::PasswordExpired => (StatusCode::FORBIDDEN, "Password has expired"),
        AuthError::InvalidSession
        | AuthError::InvalidOrExpiredSession
        | AuthError::UserDisabled => (StatusCode::UNAUTHORIZED, "Invalid or expired session"),
        AuthError::WeakPassword => (
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters long",
        ),
        AuthError::InvalidOrExpiredToken => {
            (StatusCode::BAD_REQUEST, "Invalid or expired reset token")
        }
        AuthError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
        AuthError::PermissionDenied => (StatusCode::FORBIDDEN, "Insufficient permissions"),
        AuthError::Internal(err) => {
            error!("internal error: {err:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    };
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub(crate) fn validation_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Resolve the caller and require at least manager privileges.
pub(crate) async fn require_manager(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, Response> {
    let Some(token) = extract_session_token(headers) else {
        return Err(error_response(&AuthError::InvalidOrExpiredSession));
    };
    state
        .auth
        .require_role_or_higher(&token, Role::Manager)
        .await
        .map_err(|err| error_response(&err))
}

/// Pull the session token from a bearer header or the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
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

/// Client IP from common proxy headers, falling back to the socket address.
pub(crate) fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }
    addr.ip().to_string()
}

pub(crate) fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)), 4444)
    }

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn credential_failures_are_indistinguishable() {
        // Unknown email, wrong password, and disabled account all travel
        // through InvalidCredentials; assert the rendered response is one
        // fixed shape.
        let response = error_response(&AuthError::InvalidCredentials);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_of(response).await,
            r#"{"error":"Invalid email or password"}"#
        );
    }

    #[tokio::test]
    async fn session_failures_are_indistinguishable() {
        let invalid = error_response(&AuthError::InvalidOrExpiredSession);
        let disabled = error_response(&AuthError::UserDisabled);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(disabled.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(invalid).await, body_of(disabled).await);
    }

    #[tokio::test]
    async fn internal_errors_are_opaque() {
        let response = error_response(&AuthError::Internal(anyhow::anyhow!(
            "connection to 10.0.0.5 refused"
        )));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(response).await;
        assert!(!body.contains("10.0.0.5"));
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("helmgate_session=from-cookie"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn cookie_token_is_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; helmgate_session=tok-1; lang=en"),
        );
        assert_eq!(extract_session_token(&headers), Some("tok-1".to_string()));
    }

    #[test]
    fn missing_token_yields_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.7, 203.0.113.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip(&headers, addr()), "198.51.100.7");
    }

    #[test]
    fn client_ip_falls_back_to_socket_addr() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, addr()), "203.0.113.9");
    }
}
