//! Password reset flows: self-service tokens, manual administrative resets,
//! and the automatic policy sweeps.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::{Instrument, error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::activity::ActivityLog;
use super::config::AuthConfig;
use super::credentials::{self, normalize_email};
use super::error::AuthError;
use super::users::{User, UserStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetType {
    Manual,
    AutomaticExpiry,
    AutomaticInactivity,
}

impl ResetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutomaticExpiry => "automatic_expiry",
            Self::AutomaticInactivity => "automatic_inactivity",
        }
    }
}

/// Audit record of one password replacement. Tokens are stored hashed and
/// never listed back out.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ResetEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub admin_id: Option<Uuid>,
    pub reason: String,
    pub ip_address: String,
    pub user_agent: String,
    pub success: bool,
    pub reset_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PasswordResetService {
    pool: PgPool,
    users: UserStore,
    activity: ActivityLog,
    config: AuthConfig,
}

impl PasswordResetService {
    #[must_use]
    pub fn new(pool: PgPool, users: UserStore, activity: ActivityLog, config: AuthConfig) -> Self {
        Self {
            pool,
            users,
            activity,
            config,
        }
    }

    /// Self-service entry point keyed by email.
    ///
    /// Returns `Ok(None)` for unknown or disabled accounts so the caller can
    /// answer identically either way. The token is returned for out-of-band
    /// delivery and is never persisted in the clear.
    pub async fn request_reset(
        &self,
        email: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(None);
        };
        if !user.enabled {
            return Ok(None);
        }

        let token = self
            .create_reset_event(user.id, "User requested password reset", ip, user_agent)
            .await?;
        Ok(Some(token))
    }

    /// Create an unconsumed reset event carrying a one-time token.
    pub async fn create_reset_event(
        &self,
        user_id: Uuid,
        reason: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<String, AuthError> {
        let token = credentials::generate_secure_token()?;
        let token_hash = credentials::hash_token(&token);

        let query = "INSERT INTO password_reset_events \
                 (user_id, reason, ip_address, user_agent, success, reset_type, \
                  token_hash, expires_at) \
             VALUES ($1, $2, $3, $4, FALSE, $5, $6, NOW() + ($7 * INTERVAL '1 second'))";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(reason)
            .bind(ip)
            .bind(user_agent)
            .bind(ResetType::Manual.as_str())
            .bind(&token_hash)
            .bind(self.config.reset_token_ttl_seconds())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to create password reset event")?;

        Ok(token)
    }

    /// Redeem a reset token and set the new password.
    ///
    /// The consuming UPDATE matches on the token hash, a future expiry, AND
    /// `success = FALSE`, flipping the flag in the same statement. A token is
    /// therefore usable exactly once even under concurrent redemption.
    pub async fn reset_with_token(
        &self,
        token: &str,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        credentials::validate_password(new_password.expose_secret())?;

        let token_hash = credentials::hash_token(token);
        let query = "UPDATE password_reset_events \
             SET success = TRUE \
             WHERE token_hash = $1 AND success = FALSE AND expires_at > NOW() \
             RETURNING user_id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume reset token")?;

        let Some(row) = row else {
            return Err(AuthError::InvalidOrExpiredToken);
        };
        let user_id: Uuid = row.get("user_id");

        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };

        let digest = credentials::hash_password(new_password.expose_secret()).await?;
        self.users
            .set_password_digest(user.id, &digest, self.config.password_max_age_days())
            .await?;

        if let Err(err) = self.activity.password_change(&user, "", "").await {
            error!("failed to record password change activity: {err}");
        }

        Ok(())
    }

    /// Replace a user's password with a generated one on an admin's behalf.
    ///
    /// The plaintext is returned exactly once; it is never retrievable again.
    pub async fn manual_reset(
        &self,
        user_id: Uuid,
        admin_id: Uuid,
        reason: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<String, AuthError> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Err(AuthError::NotFound);
        };

        let new_password = credentials::generate_strong_password()?;
        let digest = credentials::hash_password(&new_password).await?;
        self.users
            .set_password_digest(user.id, &digest, self.config.password_max_age_days())
            .await?;

        self.insert_completed_event(
            user.id,
            Some(admin_id),
            reason,
            ip,
            user_agent,
            ResetType::Manual,
        )
        .await?;

        if let Ok(Some(admin)) = self.users.find_by_id(admin_id).await {
            if let Err(err) = self
                .activity
                .user_crud(&admin, &user, "password_reset", ip, user_agent)
                .await
            {
                error!("failed to record password reset activity: {err}");
            }
        }

        Ok(new_password)
    }

    /// Force-reset every account whose password expiry has passed.
    ///
    /// Each user is handled independently; one failure is logged and skipped
    /// so it cannot abort the rest of the batch.
    pub async fn auto_reset_expired_passwords(&self) -> Result<u64, AuthError> {
        let users = self.users.list_password_expired().await?;
        let mut reset_count = 0;
        for user in users {
            match self
                .reset_generated(&user, "Password expired automatically", ResetType::AutomaticExpiry)
                .await
            {
                Ok(()) => reset_count += 1,
                Err(err) => {
                    warn!(user_id = %user.id, "skipping expired-password reset: {err}");
                }
            }
        }
        Ok(reset_count)
    }

    /// Force-reset every account inactive beyond the configured window.
    pub async fn auto_reset_inactive_users(&self) -> Result<u64, AuthError> {
        let window_days = self.config.inactivity_days();
        let users = self.users.list_inactive(window_days).await?;
        let reason = format!("User inactive for more than {window_days} days");
        let mut reset_count = 0;
        for user in users {
            match self
                .reset_generated(&user, &reason, ResetType::AutomaticInactivity)
                .await
            {
                Ok(()) => reset_count += 1,
                Err(err) => {
                    warn!(user_id = %user.id, "skipping inactivity reset: {err}");
                }
            }
        }
        Ok(reset_count)
    }

    /// Manual reset across a batch of users; failed ids are omitted from the
    /// result rather than failing the whole batch.
    pub async fn bulk_reset(
        &self,
        user_ids: &[Uuid],
        admin_id: Uuid,
        reason: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<HashMap<Uuid, String>, AuthError> {
        let mut results = HashMap::new();
        for &user_id in user_ids {
            match self
                .manual_reset(user_id, admin_id, reason, ip, user_agent)
                .await
            {
                Ok(password) => {
                    results.insert(user_id, password);
                }
                Err(err) => {
                    warn!(user_id = %user_id, "skipping bulk reset entry: {err}");
                }
            }
        }
        Ok(results)
    }

    pub async fn list_events_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ResetEvent>, AuthError> {
        let query = "SELECT id, user_id, admin_id, reason, ip_address, user_agent, success, \
                    reset_type, expires_at, created_at \
             FROM password_reset_events \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list reset events for user")?;
        Ok(rows.into_iter().map(event_from_row).collect())
    }

    pub async fn list_events(&self, limit: i64) -> Result<Vec<ResetEvent>, AuthError> {
        let query = "SELECT id, user_id, admin_id, reason, ip_address, user_agent, success, \
                    reset_type, expires_at, created_at \
             FROM password_reset_events \
             ORDER BY created_at DESC \
             LIMIT $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list reset events")?;
        Ok(rows.into_iter().map(event_from_row).collect())
    }

    /// Shared tail of the automatic sweeps: generate, store, record.
    async fn reset_generated(
        &self,
        user: &User,
        reason: &str,
        reset_type: ResetType,
    ) -> Result<(), AuthError> {
        let new_password = credentials::generate_strong_password()?;
        let digest = credentials::hash_password(&new_password).await?;
        self.users
            .set_password_digest(user.id, &digest, self.config.password_max_age_days())
            .await?;
        self.insert_completed_event(user.id, None, reason, "", "", reset_type)
            .await?;
        Ok(())
    }

    /// Record a reset that already happened (manual or automatic); no token.
    async fn insert_completed_event(
        &self,
        user_id: Uuid,
        admin_id: Option<Uuid>,
        reason: &str,
        ip: &str,
        user_agent: &str,
        reset_type: ResetType,
    ) -> Result<()> {
        let query = "INSERT INTO password_reset_events \
                 (user_id, admin_id, reason, ip_address, user_agent, success, reset_type) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(admin_id)
            .bind(reason)
            .bind(ip)
            .bind(user_agent)
            .bind(reset_type.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record completed reset event")?;
        Ok(())
    }
}

fn event_from_row(row: sqlx::postgres::PgRow) -> ResetEvent {
    ResetEvent {
        id: row.get("id"),
        user_id: row.get("user_id"),
        admin_id: row.get("admin_id"),
        reason: row.get("reason"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        success: row.get("success"),
        reset_type: row.get("reset_type"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::ResetType;

    #[test]
    fn reset_types_map_to_stable_tags() {
        assert_eq!(ResetType::Manual.as_str(), "manual");
        assert_eq!(ResetType::AutomaticExpiry.as_str(), "automatic_expiry");
        assert_eq!(
            ResetType::AutomaticInactivity.as_str(),
            "automatic_inactivity"
        );
    }
}
