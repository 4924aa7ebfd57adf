//! Login, logout, and session resolution.

use secrecy::{ExposeSecret, SecretString};
use tracing::error;
use uuid::Uuid;

use super::activity::ActivityLog;
use super::config::AuthConfig;
use super::credentials::{self, normalize_email};
use super::error::AuthError;
use super::roles::Role;
use super::sessions::{Session, SessionStore};
use super::users::{User, UserStore};

/// Everything a successful login hands back. The raw token appears here and
/// nowhere else.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserStore,
    sessions: SessionStore,
    activity: ActivityLog,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: UserStore,
        sessions: SessionStore,
        activity: ActivityLog,
        config: AuthConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            activity,
            config,
        }
    }

    /// Authenticate an email/password pair and open a session.
    ///
    /// Unknown email, wrong password, and disabled account all fail with
    /// `InvalidCredentials` so the response never reveals whether an account
    /// exists. The password-expiry check runs only after the supplied
    /// password verified, so expiry status is not observable to a guesser.
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
        ip: &str,
        user_agent: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            self.log_failed_login(None, &email, ip, user_agent).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !user.enabled {
            self.log_failed_login(Some(user.id), &email, ip, user_agent)
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        let verified =
            credentials::verify_password(password.expose_secret(), &user.password_digest).await?;
        if !verified {
            self.log_failed_login(Some(user.id), &email, ip, user_agent)
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_password_expired() {
            return Err(AuthError::PasswordExpired);
        }

        let user = self
            .users
            .record_sign_in(user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let (session, token) = self
            .sessions
            .create(user.id, ip, user_agent, self.config.session_ttl_seconds())
            .await?;

        if let Err(err) = self.activity.login(&user, ip, user_agent).await {
            error!("failed to record login activity: {err}");
        }

        Ok(LoginOutcome {
            user,
            session,
            token,
        })
    }

    /// Destroy the session behind `token`.
    ///
    /// Works on expired-but-present sessions; expiry gates authentication,
    /// not deletability.
    pub async fn logout(&self, token: &str, ip: &str, user_agent: &str) -> Result<(), AuthError> {
        let Some(session) = self.sessions.lookup(token).await? else {
            return Err(AuthError::InvalidSession);
        };

        let user = self.users.find_by_id(session.user_id).await?;

        self.sessions.destroy(token).await?;

        match user {
            Some(user) => {
                if let Err(err) = self.activity.logout(&user, ip, user_agent).await {
                    error!("failed to record logout activity: {err}");
                }
                Ok(())
            }
            // Session without an owner; it is gone now either way.
            None => Err(AuthError::InvalidSession),
        }
    }

    /// Resolve a token to its user and slide the session expiry forward.
    ///
    /// Called on essentially every authenticated request. Expired sessions
    /// are destroyed on detection; a disabled owner revokes every session the
    /// account still holds.
    pub async fn resolve_user(&self, token: &str) -> Result<User, AuthError> {
        let Some(session) = self.sessions.lookup(token).await? else {
            return Err(AuthError::InvalidOrExpiredSession);
        };

        if session.is_expired() {
            if let Err(err) = self.sessions.destroy(token).await {
                error!("failed to destroy expired session: {err}");
            }
            return Err(AuthError::InvalidOrExpiredSession);
        }

        let Some(user) = self.users.find_by_id(session.user_id).await? else {
            if let Err(err) = self.sessions.destroy(token).await {
                error!("failed to destroy orphaned session: {err}");
            }
            return Err(AuthError::InvalidOrExpiredSession);
        };

        if !user.enabled {
            if let Err(err) = self.sessions.destroy_all_for_user(user.id).await {
                error!("failed to revoke sessions of disabled user: {err}");
            }
            return Err(AuthError::UserDisabled);
        }

        self.sessions
            .extend(token, self.config.session_ttl_seconds())
            .await?;

        Ok(user)
    }

    /// Self-service password change; requires proof of the current password
    /// before the new one is even inspected.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &SecretString,
        new_password: &SecretString,
        ip: &str,
        user_agent: &str,
    ) -> Result<(), AuthError> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };

        let verified = credentials::verify_password(
            current_password.expose_secret(),
            &user.password_digest,
        )
        .await?;
        if !verified {
            return Err(AuthError::InvalidCredentials);
        }

        credentials::validate_password(new_password.expose_secret())?;

        let digest = credentials::hash_password(new_password.expose_secret()).await?;
        self.users
            .set_password_digest(user.id, &digest, self.config.password_max_age_days())
            .await?;

        if let Err(err) = self.activity.password_change(&user, ip, user_agent).await {
            error!("failed to record password change activity: {err}");
        }

        Ok(())
    }

    /// Resolve and require an exact role.
    pub async fn require_role(&self, token: &str, role: Role) -> Result<User, AuthError> {
        let user = self.resolve_user(token).await?;
        if user.role != role {
            return Err(AuthError::PermissionDenied);
        }
        Ok(user)
    }

    /// Resolve and require at least the given privilege tier.
    pub async fn require_role_or_higher(
        &self,
        token: &str,
        minimum: Role,
    ) -> Result<User, AuthError> {
        let user = self.resolve_user(token).await?;
        if !user.role.at_least(minimum) {
            return Err(AuthError::PermissionDenied);
        }
        Ok(user)
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn log_failed_login(&self, user_id: Option<Uuid>, email: &str, ip: &str, ua: &str) {
        if let Err(err) = self.activity.failed_login(user_id, email, ip, ua).await {
            error!("failed to record failed_login activity: {err}");
        }
    }
}
