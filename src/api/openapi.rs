//! OpenAPI document served next to the API.

use utoipa::OpenApi;

use crate::api::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::session::login,
        handlers::session::logout,
        handlers::session::session,
        handlers::password::change_password,
        handlers::password::reset_request,
        handlers::password::reset_confirm,
        handlers::users::list,
        handlers::users::create,
        handlers::users::show,
        handlers::users::update,
        handlers::users::delete,
        handlers::users::toggle_status,
        handlers::users::reset_password,
        handlers::users::bulk_reset_password,
        handlers::activity::recent,
        handlers::activity::for_user,
        handlers::activity::reset_events,
        handlers::activity::reset_events_for_user,
    ),
    components(schemas(
        handlers::ErrorBody,
        handlers::health::Health,
        handlers::session::LoginRequest,
        handlers::session::LoginResponse,
        handlers::session::SessionResponse,
        handlers::password::ChangePasswordRequest,
        handlers::password::ResetRequest,
        handlers::password::ResetConfirmRequest,
        handlers::password::ResetRequestedResponse,
        handlers::users::UserListResponse,
        handlers::users::CreateUserRequest,
        handlers::users::UpdateUserRequest,
        handlers::users::ManualResetRequest,
        handlers::users::ManualResetResponse,
        handlers::users::BulkResetRequest,
        handlers::users::BulkResetResponse,
        handlers::activity::ActivityListResponse,
        handlers::activity::ResetEventListResponse,
        crate::auth::User,
        crate::auth::Session,
        crate::auth::Role,
        crate::auth::ActivityRecord,
        crate::auth::ResetEvent,
    )),
    tags(
        (name = "auth", description = "Login, sessions, and password lifecycle"),
        (name = "users", description = "Role-scoped user management"),
        (name = "activity", description = "Audit trail"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn document_contains_core_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/v1/auth/login"));
        assert!(paths.contains_key("/v1/auth/session"));
        assert!(paths.contains_key("/v1/users"));
        assert!(paths.contains_key("/v1/users/{id}/reset-password"));
        assert!(paths.contains_key("/health"));
    }
}
