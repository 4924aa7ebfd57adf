//! User records and their database access.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::roles::Role;

/// A principal. The password digest never serializes.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_digest: String,
    pub role: Role,
    pub company: Option<String>,
    pub enabled: bool,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub current_sign_in_at: Option<DateTime<Utc>>,
    pub sign_in_count: i32,
    pub password_reset_at: Option<DateTime<Utc>>,
    pub password_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True iff a password expiry is set and already behind us.
    #[must_use]
    pub fn is_password_expired(&self) -> bool {
        self.password_expires_at
            .is_some_and(|expires_at| expires_at < Utc::now())
    }

    /// True iff the last completed sign-in is older than `window_days`.
    #[must_use]
    pub fn inactive_for(&self, window_days: i64) -> bool {
        self.last_sign_in_at
            .is_some_and(|last| last < Utc::now() - chrono::Duration::days(window_days))
    }
}

/// Fields needed to create a user row.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_digest: String,
    pub role: Role,
    pub company: Option<String>,
    pub enabled: bool,
    pub password_expires_days: i64,
}

/// Profile fields an administrator may edit in place.
#[derive(Debug)]
pub struct UserChanges {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub company: Option<String>,
    pub enabled: bool,
}

/// Outcome of an insert/update that can collide on the email unique index.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(User),
    EmailTaken,
}

/// Listing filters; unset fields do not constrain the query.
#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub enabled: Option<bool>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

const USER_COLUMNS: &str = "id, email, name, password_digest, role, company, enabled, \
     last_sign_in_at, current_sign_in_at, sign_in_count, password_reset_at, \
     password_expires_at, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.get("role");
    let role = Role::parse(&role).with_context(|| format!("unknown role in database: {role}"))?;
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_digest: row.get("password_digest"),
        role,
        company: row.get("company"),
        enabled: row.get("enabled"),
        last_sign_in_at: row.get("last_sign_in_at"),
        current_sign_in_at: row.get("current_sign_in_at"),
        sign_in_count: row.get("sign_in_count"),
        password_reset_at: row.get("password_reset_at"),
        password_expires_at: row.get("password_expires_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by id")?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Expects an already-normalized email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by email")?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn insert(&self, new_user: NewUser) -> Result<SaveOutcome> {
        let query = format!(
            "INSERT INTO users \
                 (email, name, password_digest, role, company, enabled, \
                  password_reset_at, password_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW() + ($7 * INTERVAL '1 day')) \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.password_digest)
            .bind(new_user.role.as_str())
            .bind(&new_user.company)
            .bind(new_user.enabled)
            .bind(new_user.password_expires_days)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(SaveOutcome::Saved(user_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(SaveOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    /// Returns `Ok(None)` when the user no longer exists.
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<SaveOutcome>> {
        let query = format!(
            "UPDATE users \
             SET email = $2, name = $3, role = $4, company = $5, enabled = $6, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(&changes.email)
            .bind(&changes.name)
            .bind(changes.role.as_str())
            .bind(&changes.company)
            .bind(changes.enabled)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(Some(row)) => Ok(Some(SaveOutcome::Saved(user_from_row(&row)?))),
            Ok(None) => Ok(None),
            Err(err) if is_unique_violation(&err) => Ok(Some(SaveOutcome::EmailTaken)),
            Err(err) => Err(err).context("failed to update user"),
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users SET enabled = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(enabled)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to update user enabled flag")?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Shift the sign-in bookkeeping in one statement so concurrent logins
    /// cannot interleave half-updated counters.
    pub async fn record_sign_in(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users \
             SET last_sign_in_at = current_sign_in_at, \
                 current_sign_in_at = NOW(), \
                 sign_in_count = sign_in_count + 1, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to record sign-in")?;
        row.as_ref().map(user_from_row).transpose()
    }

    /// Store a new digest and restart the expiry window.
    pub async fn set_password_digest(
        &self,
        id: Uuid,
        digest: &str,
        max_age_days: i64,
    ) -> Result<bool> {
        let query = "UPDATE users \
             SET password_digest = $2, \
                 password_reset_at = NOW(), \
                 password_expires_at = NOW() + ($3 * INTERVAL '1 day'), \
                 updated_at = NOW() \
             WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(digest)
            .bind(max_age_days)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store password digest")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self, filter: &UserFilter) -> Result<(Vec<User>, i64)> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
               AND ($2::boolean IS NULL OR enabled = $2) \
               AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                    OR email ILIKE '%' || $3 || '%') \
             ORDER BY created_at DESC \
             LIMIT $4 OFFSET $5"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .bind(filter.role.map(Role::as_str))
            .bind(filter.enabled)
            .bind(&filter.search)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users")?;
        let users = rows
            .iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>>>()?;

        let query = "SELECT COUNT(*) AS total FROM users \
             WHERE ($1::text IS NULL OR role = $1) \
               AND ($2::boolean IS NULL OR enabled = $2) \
               AND ($3::text IS NULL OR name ILIKE '%' || $3 || '%' \
                    OR email ILIKE '%' || $3 || '%')";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(filter.role.map(Role::as_str))
            .bind(filter.enabled)
            .bind(&filter.search)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count users")?;
        let total: i64 = row.get("total");

        Ok((users, total))
    }

    pub async fn count(&self) -> Result<i64> {
        let query = "SELECT COUNT(*) AS total FROM users";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count users")?;
        Ok(row.get("total"))
    }

    /// Users whose password expiry is already behind us.
    pub async fn list_password_expired(&self) -> Result<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE password_expires_at IS NOT NULL AND password_expires_at < NOW()"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users with expired passwords")?;
        rows.iter().map(user_from_row).collect()
    }

    /// Users whose last completed sign-in is older than `window_days`.
    pub async fn list_inactive(&self, window_days: i64) -> Result<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE last_sign_in_at IS NOT NULL \
               AND last_sign_in_at < NOW() - ($1 * INTERVAL '1 day')"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        let rows = sqlx::query(&query)
            .bind(window_days)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list inactive users")?;
        rows.iter().map(user_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "skipper@example.com".to_string(),
            name: "Skipper".to_string(),
            password_digest: String::new(),
            role: Role::Salesperson,
            company: None,
            enabled: true,
            last_sign_in_at: None,
            current_sign_in_at: None,
            sign_in_count: 0,
            password_reset_at: None,
            password_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_expiry_requires_a_set_timestamp() {
        let mut u = user();
        assert!(!u.is_password_expired());
        u.password_expires_at = Some(Utc::now() + Duration::days(1));
        assert!(!u.is_password_expired());
        u.password_expires_at = Some(Utc::now() - Duration::minutes(1));
        assert!(u.is_password_expired());
    }

    #[test]
    fn inactivity_requires_a_previous_sign_in() {
        let mut u = user();
        assert!(!u.inactive_for(10));
        u.last_sign_in_at = Some(Utc::now() - Duration::days(3));
        assert!(!u.inactive_for(10));
        u.last_sign_in_at = Some(Utc::now() - Duration::days(11));
        assert!(u.inactive_for(10));
    }

    #[test]
    fn save_outcome_debug_names() {
        assert_eq!(format!("{:?}", SaveOutcome::EmailTaken), "EmailTaken");
    }

    #[test]
    fn user_serialization_skips_the_digest() {
        let mut u = user();
        u.password_digest = "secret-digest".to_string();
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("secret-digest"));
        assert!(json.contains("skipper@example.com"));
        assert!(json.contains("\"role\":\"salesperson\""));
    }
}
