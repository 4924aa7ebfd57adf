//! Append-only audit trail of security-relevant actions.
//!
//! Writes are best-effort: callers log failures and carry on, so a broken
//! audit insert never rolls back the action it describes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::users::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityKind {
    Login,
    Logout,
    FailedLogin,
    PasswordChange,
    PageView,
    UserCrud,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::FailedLogin => "failed_login",
            Self::PasswordChange => "password_change",
            Self::PageView => "page_view",
            Self::UserCrud => "user_crud",
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub activity_type: String,
    pub subject_type: Option<String>,
    pub subject_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    pub session_duration: Option<i32>,
    pub metadata: Option<serde_json::Value>,
    pub performed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ActivityLog {
    pool: PgPool,
}

impl ActivityLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        kind: ActivityKind,
        ip_address: &str,
        user_agent: &str,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let query = "INSERT INTO user_activities \
                 (user_id, activity_type, ip_address, user_agent, metadata) \
             VALUES ($1, $2, $3, $4, $5)";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(kind.as_str())
            .bind(ip_address)
            .bind(user_agent)
            .bind(metadata)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record activity")?;
        Ok(())
    }

    pub async fn login(&self, user: &User, ip: &str, user_agent: &str) -> Result<()> {
        let metadata = json!({
            "user_id": user.id,
            "user_name": user.name,
            "user_role": user.role.as_str(),
        });
        self.record(Some(user.id), ActivityKind::Login, ip, user_agent, metadata)
            .await
    }

    pub async fn logout(&self, user: &User, ip: &str, user_agent: &str) -> Result<()> {
        let metadata = json!({
            "user_id": user.id,
            "user_name": user.name,
        });
        self.record(Some(user.id), ActivityKind::Logout, ip, user_agent, metadata)
            .await
    }

    /// `user_id` is absent when the attempted email matched no account.
    pub async fn failed_login(
        &self,
        user_id: Option<Uuid>,
        attempted_email: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<()> {
        let mut metadata = json!({ "attempted_email": attempted_email });
        if let Some(id) = user_id
            && let Some(object) = metadata.as_object_mut()
        {
            object.insert("user_id".to_string(), json!(id));
        }
        self.record(user_id, ActivityKind::FailedLogin, ip, user_agent, metadata)
            .await
    }

    pub async fn password_change(&self, user: &User, ip: &str, user_agent: &str) -> Result<()> {
        let metadata = json!({
            "user_id": user.id,
            "user_name": user.name,
        });
        self.record(
            Some(user.id),
            ActivityKind::PasswordChange,
            ip,
            user_agent,
            metadata,
        )
        .await
    }

    pub async fn page_view(&self, user: &User, page: &str, ip: &str, user_agent: &str) -> Result<()> {
        let metadata = json!({
            "page": page,
            "user_id": user.id,
            "user_name": user.name,
        });
        self.record(Some(user.id), ActivityKind::PageView, ip, user_agent, metadata)
            .await
    }

    /// Administrative mutation of one user by another.
    pub async fn user_crud(
        &self,
        actor: &User,
        target: &User,
        action: &str,
        ip: &str,
        user_agent: &str,
    ) -> Result<()> {
        let metadata = json!({
            "performing_user_id": actor.id,
            "performing_user_name": actor.name,
            "target_user_id": target.id,
            "target_user_name": target.name,
            "action": action,
        });
        self.record(Some(actor.id), ActivityKind::UserCrud, ip, user_agent, metadata)
            .await
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<ActivityRecord>> {
        let query = "SELECT id, user_id, activity_type, subject_type, subject_id, ip_address, \
                    user_agent, session_duration, metadata, performed_at \
             FROM user_activities \
             WHERE user_id = $1 \
             ORDER BY performed_at DESC \
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
            .context("failed to list user activities")?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<ActivityRecord>> {
        let query = "SELECT id, user_id, activity_type, subject_type, subject_id, ip_address, \
                    user_agent, session_duration, metadata, performed_at \
             FROM user_activities \
             ORDER BY performed_at DESC \
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
            .context("failed to list recent activities")?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }
}

fn record_from_row(row: sqlx::postgres::PgRow) -> ActivityRecord {
    ActivityRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        activity_type: row.get("activity_type"),
        subject_type: row.get("subject_type"),
        subject_id: row.get("subject_id"),
        ip_address: row.get("ip_address"),
        user_agent: row.get("user_agent"),
        session_duration: row.get("session_duration"),
        metadata: row.get("metadata"),
        performed_at: row.get("performed_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::ActivityKind;

    #[test]
    fn activity_kinds_map_to_stable_tags() {
        assert_eq!(ActivityKind::Login.as_str(), "login");
        assert_eq!(ActivityKind::Logout.as_str(), "logout");
        assert_eq!(ActivityKind::FailedLogin.as_str(), "failed_login");
        assert_eq!(ActivityKind::PasswordChange.as_str(), "password_change");
        assert_eq!(ActivityKind::PageView.as_str(), "page_view");
        assert_eq!(ActivityKind::UserCrud.as_str(), "user_crud");
    }
}
