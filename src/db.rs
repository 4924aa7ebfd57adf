//! Database connection, migrations, and first-run seeding.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

use crate::auth::{AuthConfig, NewUser, Role, SaveOutcome, UserStore, credentials};

/// Connect to the database with the standard pool shape.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .context("Failed to run database migrations")
}

/// Seed the initial accounts when the users table is empty.
///
/// Idempotent: a non-empty table is left untouched. The seed password is for
/// first login only; the 30-day expiry window forces rotation.
pub async fn seed(pool: &PgPool, config: &AuthConfig) -> Result<()> {
    let users = UserStore::new(pool.clone());
    if users.count().await? > 0 {
        return Ok(());
    }

    let company = config.allowed_companies().first().cloned();
    let seed_accounts = [
        ("admin@example.com", "Admin User", Role::Admin, None),
        (
            "manager@example.com",
            "Sales Manager",
            Role::Manager,
            company.clone(),
        ),
        (
            "sales@example.com",
            "Salesperson",
            Role::Salesperson,
            company,
        ),
    ];

    let digest = credentials::hash_password("password123").await?;
    for (email, name, role, company) in seed_accounts {
        let outcome = users
            .insert(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                password_digest: digest.clone(),
                role,
                company,
                enabled: true,
                password_expires_days: config.password_max_age_days(),
            })
            .await?;
        if let SaveOutcome::Saved(user) = outcome {
            info!(email = %user.email, role = %user.role, "seeded user");
        }
    }

    Ok(())
}
