//! Audit trail listings.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{ActivityRecord, AuthError, ResetEvent};

use super::{AppState, error_response, require_manager, users::load_managed};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize, IntoParams)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct ResetEventListResponse {
    pub events: Vec<ResetEvent>,
}

fn clamp_limit(params: &LimitParams) -> i64 {
    params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[utoipa::path(
    get,
    path = "/v1/activity",
    params(LimitParams),
    responses(
        (status = 200, description = "Recent security activity, newest first", body = ActivityListResponse),
        (status = 403, description = "Not a manager or admin", body = super::ErrorBody)
    ),
    tag = "activity"
)]
pub async fn recent(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LimitParams>,
) -> Response {
    if let Err(response) = require_manager(&state, &headers).await {
        return response;
    }

    match state.activity.list_recent(clamp_limit(&params)).await {
        Ok(activities) => {
            (StatusCode::OK, Json(ActivityListResponse { activities })).into_response()
        }
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/activity",
    params(("id" = Uuid, Path, description = "User id"), LimitParams),
    responses(
        (status = 200, description = "Activity for one user, newest first", body = ActivityListResponse),
        (status = 404, description = "Unknown or unmanageable user", body = super::ErrorBody)
    ),
    tag = "activity"
)]
pub async fn for_user(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let target = match load_managed(&state, &actor, id).await {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state
        .activity
        .list_for_user(target.id, clamp_limit(&params))
        .await
    {
        Ok(activities) => {
            (StatusCode::OK, Json(ActivityListResponse { activities })).into_response()
        }
        Err(err) => error_response(&AuthError::from(err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/resets",
    params(LimitParams),
    responses(
        (status = 200, description = "Recent password reset events, newest first", body = ResetEventListResponse),
        (status = 403, description = "Not a manager or admin", body = super::ErrorBody)
    ),
    tag = "activity"
)]
pub async fn reset_events(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LimitParams>,
) -> Response {
    if let Err(response) = require_manager(&state, &headers).await {
        return response;
    }

    match state.resets.list_events(clamp_limit(&params)).await {
        Ok(events) => (StatusCode::OK, Json(ResetEventListResponse { events })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/resets",
    params(("id" = Uuid, Path, description = "User id"), LimitParams),
    responses(
        (status = 200, description = "Reset events for one user, newest first", body = ResetEventListResponse),
        (status = 404, description = "Unknown or unmanageable user", body = super::ErrorBody)
    ),
    tag = "activity"
)]
pub async fn reset_events_for_user(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<LimitParams>,
) -> Response {
    let actor = match require_manager(&state, &headers).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let target = match load_managed(&state, &actor, id).await {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state
        .resets
        .list_events_for_user(target.id, clamp_limit(&params))
        .await
    {
        Ok(events) => (StatusCode::OK, Json(ResetEventListResponse { events })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::{LimitParams, clamp_limit};

    #[test]
    fn limits_are_clamped() {
        assert_eq!(clamp_limit(&LimitParams { limit: None }), 50);
        assert_eq!(clamp_limit(&LimitParams { limit: Some(0) }), 1);
        assert_eq!(clamp_limit(&LimitParams { limit: Some(10_000) }), 200);
        assert_eq!(clamp_limit(&LimitParams { limit: Some(25) }), 25);
    }
}
