//! Role-gated user management endpoints.
//!
//! Every route requires at least manager privileges. `can_manage` and
//! `can_disable` gate which targets an actor may touch, and role assignment
//! is validated separately so a manager can never create or promote anything
//! but salespeople.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{ConnectInfo, Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{
    AuthError, NewUser, Role, SaveOutcome, User, UserChanges, UserFilter, can_disable, can_manage,
    credentials,
};

use super::{AppState, client_ip, error_response, require_manager, user_agent, validation_error};

const DEFAULT_PAGE_SIZE: i64 = 25;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize, IntoParams)]
pub struct ListParams {
    /// 1-based page number.
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Substring match against name or email.
    pub q: Option<String>,
    pub role: Option<Role>,
    /// "enabled" or "disabled".
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
    pub role: Role,
    pub company: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub company: Option<String>,
    pub enabled: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct ManualResetRequest {
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ManualResetResponse {
    /// Generated password; display it once, it is never retrievable again.
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct BulkResetRequest {
    pub user_ids: Vec<Uuid>,
    pub reason: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct BulkResetResponse {
    /// Generated passwords keyed by user id; ids that failed are omitted.
    pub passwords: HashMap<String, String>,
}

#[utoipa::path(
    get,
    path = "/v1/users",
    params(ListParams),
    responses(
        (status = 200, description = "Paginated user listing", body = UserListResponse),
        (status = 401, description = "Not authenticated", body = super::ErrorBody),
        (status = 403, description = "Not a manager or admin", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn list(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    // Managers only ever see salespeople, whatever filter they ask for.
    let role = if actor.role == Role::Manager {
        Some(Role::Salesperson)
    } else {
        params.role
    };
    let enabled = match params.status.as_deref() {
        Some("enabled") => Some(true),
        Some("disabled") => Some(false),
        _ => None,
    };

    let filter = UserFilter {
        role,
        enabled,
        search: params.q.clone().filter(|q| !q.trim().is_empty()),
        limit: per_page,
        offset: (page - 1) * per_page,
    };

    match state.users.list(&filter).await {
        Ok((users, total)) => (
            StatusCode::OK,
            Json(UserListResponse {
                users,
                total,
                page,
                per_page,
            }),
        )
            .into_response(),
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation failed", body = super::ErrorBody),
        (status = 403, description = "Role assignment not permitted", body = super::ErrorBody),
        (status = 409, description = "Email already in use", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn create(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Option<Json<CreateUserRequest>>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    // Privilege escalation is blocked at request validation; can_manage alone
    // does not express role-assignment limits.
    if actor.role == Role::Manager && request.role != Role::Salesperson {
        return error_response(&AuthError::PermissionDenied);
    }

    if let Err(message) = credentials::validate_name(&request.name) {
        return validation_error(message);
    }
    let email = credentials::normalize_email(&request.email);
    if !credentials::valid_email(&email) {
        return validation_error("invalid email address");
    }
    if let Err(message) = credentials::validate_company(
        request.company.as_deref(),
        state.auth.config().allowed_companies(),
    ) {
        return validation_error(message);
    }
    if let Err(err) = credentials::validate_password(request.password.expose_secret()) {
        return error_response(&err);
    }

    let digest = match credentials::hash_password(request.password.expose_secret()).await {
        Ok(digest) => digest,
        Err(err) => return error_response(&AuthError::from(err)),
    };

    let outcome = state
        .users
        .insert(NewUser {
            email,
            name: request.name.trim().to_string(),
            password_digest: digest,
            role: request.role,
            company: request.company,
            enabled: request.enabled.unwrap_or(true),
            password_expires_days: state.auth.config().password_max_age_days(),
        })
        .await;

    match outcome {
        Ok(SaveOutcome::Saved(user)) => {
            let ip = client_ip(&headers, addr);
            let agent = user_agent(&headers);
            if let Err(err) = state
                .activity
                .user_crud(&actor, &user, "create", &ip, &agent)
                .await
            {
                error!("failed to record user create activity: {err}");
            }
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Ok(SaveOutcome::EmailTaken) => email_taken_response(),
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "Unknown or unmanageable user", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn show(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match load_managed(&state, &actor, id).await {
        Ok(target) => (StatusCode::OK, Json(target)).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation failed", body = super::ErrorBody),
        (status = 403, description = "Not permitted", body = super::ErrorBody),
        (status = 404, description = "Unknown user", body = super::ErrorBody),
        (status = 409, description = "Email already in use", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn update(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateUserRequest>>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let target = match state.users.find_by_id(id).await {
        Ok(Some(target)) => target,
        Ok(None) => return error_response(&AuthError::NotFound),
        Err(err) => return error_response(&AuthError::from(err)),
    };

    if !can_manage(&actor, &target) {
        return error_response(&AuthError::PermissionDenied);
    }

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    if actor.role == Role::Manager && request.role != Role::Salesperson {
        return error_response(&AuthError::PermissionDenied);
    }

    if let Err(message) = credentials::validate_name(&request.name) {
        return validation_error(message);
    }
    let email = credentials::normalize_email(&request.email);
    if !credentials::valid_email(&email) {
        return validation_error("invalid email address");
    }
    if let Err(message) = credentials::validate_company(
        request.company.as_deref(),
        state.auth.config().allowed_companies(),
    ) {
        return validation_error(message);
    }

    let disabling = target.enabled && !request.enabled;
    if disabling && !can_disable(&actor, &target) {
        return error_response(&AuthError::PermissionDenied);
    }

    let outcome = state
        .users
        .update(
            id,
            UserChanges {
                email,
                name: request.name.trim().to_string(),
                role: request.role,
                company: request.company,
                enabled: request.enabled,
            },
        )
        .await;

    match outcome {
        Ok(Some(SaveOutcome::Saved(updated))) => {
            if disabling {
                // Disabling cuts off the account immediately, not at the next
                // session expiry.
                if let Err(err) = state.sessions.destroy_all_for_user(updated.id).await {
                    error!("failed to revoke sessions of disabled user: {err}");
                }
            }
            let ip = client_ip(&headers, addr);
            let agent = user_agent(&headers);
            if let Err(err) = state
                .activity
                .user_crud(&actor, &updated, "update", &ip, &agent)
                .await
            {
                error!("failed to record user update activity: {err}");
            }
            (StatusCode::OK, Json(updated)).into_response()
        }
        Ok(Some(SaveOutcome::EmailTaken)) => email_taken_response(),
        Ok(None) => error_response(&AuthError::NotFound),
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not permitted", body = super::ErrorBody),
        (status = 404, description = "Unknown user", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn delete(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let target = match state.users.find_by_id(id).await {
        Ok(Some(target)) => target,
        Ok(None) => return error_response(&AuthError::NotFound),
        Err(err) => return error_response(&AuthError::from(err)),
    };

    if !can_manage(&actor, &target) || actor.id == target.id {
        return error_response(&AuthError::PermissionDenied);
    }

    match state.users.delete(id).await {
        Ok(true) => {
            let ip = client_ip(&headers, addr);
            let agent = user_agent(&headers);
            if let Err(err) = state
                .activity
                .user_crud(&actor, &target, "delete", &ip, &agent)
                .await
            {
                error!("failed to record user delete activity: {err}");
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(&AuthError::NotFound),
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/toggle-status",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Enabled flag flipped", body = User),
        (status = 403, description = "Target cannot be disabled by this actor", body = super::ErrorBody),
        (status = 404, description = "Unknown user", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn toggle_status(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let target = match state.users.find_by_id(id).await {
        Ok(Some(target)) => target,
        Ok(None) => return error_response(&AuthError::NotFound),
        Err(err) => return error_response(&AuthError::from(err)),
    };

    if !can_disable(&actor, &target) {
        return error_response(&AuthError::PermissionDenied);
    }

    let enabling = !target.enabled;
    match state.users.set_enabled(id, enabling).await {
        Ok(Some(updated)) => {
            if !updated.enabled {
                if let Err(err) = state.sessions.destroy_all_for_user(updated.id).await {
                    error!("failed to revoke sessions of disabled user: {err}");
                }
            }
            let action = if updated.enabled { "enable" } else { "disable" };
            let ip = client_ip(&headers, addr);
            let agent = user_agent(&headers);
            if let Err(err) = state
                .activity
                .user_crud(&actor, &updated, action, &ip, &agent)
                .await
            {
                error!("failed to record status toggle activity: {err}");
            }
            (StatusCode::OK, Json(updated)).into_response()
        }
        Ok(None) => error_response(&AuthError::NotFound),
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/reset-password",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = ManualResetRequest,
    responses(
        (status = 200, description = "Password reset; generated password returned once", body = ManualResetResponse),
        (status = 403, description = "Not permitted", body = super::ErrorBody),
        (status = 404, description = "Unknown user", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn reset_password(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<ManualResetRequest>>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let target = match state.users.find_by_id(id).await {
        Ok(Some(target)) => target,
        Ok(None) => return error_response(&AuthError::NotFound),
        Err(err) => return error_response(&AuthError::from(err)),
    };

    if !can_manage(&actor, &target) {
        return error_response(&AuthError::PermissionDenied);
    }

    let reason = payload
        .and_then(|Json(request)| request.reason)
        .unwrap_or_else(|| "Admin initiated password reset".to_string());

    let ip = client_ip(&headers, addr);
    let agent = user_agent(&headers);

    match state
        .resets
        .manual_reset(target.id, actor.id, &reason, &ip, &agent)
        .await
    {
        Ok(password) => (StatusCode::OK, Json(ManualResetResponse { password })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/users/reset-password",
    request_body = BulkResetRequest,
    responses(
        (status = 200, description = "Bulk reset outcome; failed ids are omitted", body = BulkResetResponse),
        (status = 403, description = "Not a manager or admin", body = super::ErrorBody)
    ),
    tag = "users"
)]
pub async fn bulk_reset_password(
    state: Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Option<Json<BulkResetRequest>>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    // Per-item authorization: silently drop targets the actor cannot manage,
    // consistent with how failed resets are omitted from the result.
    let mut allowed_ids = Vec::new();
    for user_id in request.user_ids {
        match state.users.find_by_id(user_id).await {
            Ok(Some(target)) if can_manage(&actor, &target) => allowed_ids.push(user_id),
            Ok(_) => {}
            Err(err) => return error_response(&AuthError::from(err)),
        }
    }

    let reason = request
        .reason
        .unwrap_or_else(|| "Admin initiated password reset".to_string());
    let ip = client_ip(&headers, addr);
    let agent = user_agent(&headers);

    match state
        .resets
        .bulk_reset(&allowed_ids, actor.id, &reason, &ip, &agent)
        .await
    {
        Ok(passwords) => {
            let passwords = passwords
                .into_iter()
                .map(|(id, password)| (id.to_string(), password))
                .collect();
            (StatusCode::OK, Json(BulkResetResponse { passwords })).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// Load a target the actor is allowed to see; unmanageable targets render as
/// 404 rather than 403 to avoid resource enumeration.
pub(super) async fn load_managed(
    state: &AppState,
    actor: &User,
    id: Uuid,
) -> Result<User, Response> {
    match state.users.find_by_id(id).await {
        Ok(Some(target)) if can_manage(actor, &target) => Ok(target),
        Ok(_) => Err(error_response(&AuthError::NotFound)),
        Err(err) => Err(error_response(&AuthError::from(err))),
    }
}

fn email_taken_response() -> Response {
    (
        StatusCode::CONFLICT,
        Json(super::ErrorBody {
            error: "Email address is already in use".to_string(),
        }),
    )
        .into_response()
}
