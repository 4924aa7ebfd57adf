//! Session, password-policy, and sweep arguments.

use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PASSWORD_MAX_AGE_DAYS: &str = "password-max-age-days";
pub const ARG_INACTIVITY_DAYS: &str = "inactivity-days";
pub const ARG_RESET_TOKEN_TTL_SECONDS: &str = "reset-token-ttl-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_ALLOWED_COMPANIES: &str = "allowed-companies";

#[derive(Debug)]
pub struct Options {
    pub session_ttl_seconds: i64,
    pub password_max_age_days: i64,
    pub inactivity_days: i64,
    pub reset_token_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub frontend_base_url: String,
    pub allowed_companies: Option<Vec<String>>,
}

impl Options {
    /// Extract typed auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .context("missing session-ttl-seconds")?,
            password_max_age_days: matches
                .get_one::<i64>(ARG_PASSWORD_MAX_AGE_DAYS)
                .copied()
                .context("missing password-max-age-days")?,
            inactivity_days: matches
                .get_one::<i64>(ARG_INACTIVITY_DAYS)
                .copied()
                .context("missing inactivity-days")?,
            reset_token_ttl_seconds: matches
                .get_one::<i64>(ARG_RESET_TOKEN_TTL_SECONDS)
                .copied()
                .context("missing reset-token-ttl-seconds")?,
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL_SECONDS)
                .copied()
                .context("missing sweep-interval-seconds")?,
            frontend_base_url: matches
                .get_one::<String>(ARG_FRONTEND_BASE_URL)
                .cloned()
                .context("missing frontend-base-url")?,
            allowed_companies: matches
                .get_many::<String>(ARG_ALLOWED_COMPANIES)
                .map(|values| values.cloned().collect()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Idle session lifetime; each authenticated request slides it forward")
                .default_value("1800")
                .env("HELMGATE_SESSION_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_MAX_AGE_DAYS)
                .long(ARG_PASSWORD_MAX_AGE_DAYS)
                .help("Days until a freshly set password expires")
                .default_value("30")
                .env("HELMGATE_PASSWORD_MAX_AGE_DAYS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_INACTIVITY_DAYS)
                .long(ARG_INACTIVITY_DAYS)
                .help("Days without a sign-in before the sweep forces a password reset")
                .default_value("10")
                .env("HELMGATE_INACTIVITY_DAYS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_RESET_TOKEN_TTL_SECONDS)
                .help("Lifetime of self-service password reset tokens")
                .default_value("86400")
                .env("HELMGATE_RESET_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("How often the background sweeper runs")
                .default_value("3600")
                .env("HELMGATE_SWEEP_INTERVAL_SECONDS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Origin allowed by CORS; also decides the Secure cookie flag")
                .default_value("http://localhost:3000")
                .env("HELMGATE_FRONTEND_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_ALLOWED_COMPANIES)
                .long(ARG_ALLOWED_COMPANIES)
                .help("Comma-separated company allow-list for user profiles")
                .env("HELMGATE_ALLOWED_COMPANIES")
                .value_delimiter(',')
                .num_args(1..),
        )
}
