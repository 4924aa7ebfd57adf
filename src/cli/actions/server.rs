use anyhow::Result;

use crate::api;
use crate::auth::AuthConfig;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_ttl_seconds: i64,
    pub password_max_age_days: i64,
    pub inactivity_days: i64,
    pub reset_token_ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub frontend_base_url: String,
    pub allowed_companies: Option<Vec<String>>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_password_max_age_days(args.password_max_age_days)
        .with_inactivity_days(args.inactivity_days)
        .with_reset_token_ttl_seconds(args.reset_token_ttl_seconds)
        .with_sweep_interval_seconds(args.sweep_interval_seconds);

    if let Some(companies) = args.allowed_companies {
        config = config.with_allowed_companies(companies);
    }

    api::serve(args.port, args.dsn, config).await
}
