//! Session records keyed by hashed opaque tokens.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::credentials::{generate_secure_token, hash_token};
use super::users::is_unique_violation;

/// A proof of authentication. Only the token's hash is ever stored; the raw
/// token exists transiently in the login response and the caller's cookie.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Expiry is evaluated at resolution time; the hourly sweep only prunes.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[derive(Clone)]
pub struct SessionStore {
    pool: PgPool,
}

impl SessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a session and return it with the raw token.
    ///
    /// Retries on a token-hash collision; the unique index is what makes
    /// duplicate tokens structurally impossible.
    pub async fn create(
        &self,
        user_id: Uuid,
        ip_address: &str,
        user_agent: &str,
        ttl_seconds: i64,
    ) -> Result<(Session, String)> {
        let query = "INSERT INTO sessions (user_id, token_hash, ip_address, user_agent, expires_at) \
             VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second')) \
             RETURNING id, user_id, ip_address, user_agent, expires_at, created_at, updated_at";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..3 {
            let token = generate_secure_token()?;
            let token_hash = hash_token(&token);
            let row = sqlx::query(query)
                .bind(user_id)
                .bind(&token_hash)
                .bind(ip_address)
                .bind(user_agent)
                .bind(ttl_seconds)
                .fetch_one(&self.pool)
                .instrument(span.clone())
                .await;

            match row {
                Ok(row) => {
                    let session = Session {
                        id: row.get("id"),
                        user_id: row.get("user_id"),
                        ip_address: row.get("ip_address"),
                        user_agent: row.get("user_agent"),
                        expires_at: row.get("expires_at"),
                        created_at: row.get("created_at"),
                        updated_at: row.get("updated_at"),
                    };
                    return Ok((session, token));
                }
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow!("failed to generate a unique session token"))
    }

    /// Exact match on the stored token hash.
    ///
    /// Absence is a normal outcome, not a fault, and expired-but-present rows
    /// are still returned: expiry gates authentication, not deletability.
    pub async fn lookup(&self, token: &str) -> Result<Option<Session>> {
        let token_hash = hash_token(token);
        let query = "SELECT id, user_id, ip_address, user_agent, expires_at, created_at, updated_at \
             FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up session")?;

        Ok(row.map(|row| Session {
            id: row.get("id"),
            user_id: row.get("user_id"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    /// Slide the expiry forward; no-op when the token is unknown.
    pub async fn extend(&self, token: &str, ttl_seconds: i64) -> Result<()> {
        let token_hash = hash_token(token);
        let query = "UPDATE sessions \
             SET expires_at = NOW() + ($2 * INTERVAL '1 second'), updated_at = NOW() \
             WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&token_hash)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to extend session")?;
        Ok(())
    }

    /// Idempotent; deleting an absent session is fine.
    pub async fn destroy(&self, token: &str) -> Result<()> {
        let token_hash = hash_token(token);
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to destroy session")?;
        Ok(())
    }

    /// Force-logout: drop every session the user holds.
    pub async fn destroy_all_for_user(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to destroy user sessions")?;
        Ok(result.rows_affected())
    }

    /// Bulk-delete sessions whose expiry is in the past. Run periodically;
    /// `lookup` callers never depend on sweep timing for correctness.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at < NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to sweep expired sessions")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_at: DateTime<Utc>) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ip_address: "192.0.2.1".to_string(),
            user_agent: "test-agent".to_string(),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expiry_is_computed_against_now() {
        assert!(!session(Utc::now() + Duration::minutes(30)).is_expired());
        assert!(session(Utc::now() - Duration::seconds(1)).is_expired());
    }
}
