//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        password_max_age_days: auth_opts.password_max_age_days,
        inactivity_days: auth_opts.inactivity_days,
        reset_token_ttl_seconds: auth_opts.reset_token_ttl_seconds,
        sweep_interval_seconds: auth_opts.sweep_interval_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        allowed_companies: auth_opts.allowed_companies,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn dsn_required() {
        temp_env::with_vars([("HELMGATE_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let result = command.try_get_matches_from(vec!["helmgate"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn server_args_carry_auth_options() {
        temp_env::with_vars([("HELMGATE_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command
                .try_get_matches_from(vec![
                    "helmgate",
                    "--dsn",
                    "postgres://localhost/helmgate",
                    "--session-ttl-seconds",
                    "600",
                    "--allowed-companies",
                    "Acme,Globex",
                ])
                .expect("matches");
            let Action::Server(args) = handler(&matches).expect("handler");
            assert_eq!(args.port, 8080);
            assert_eq!(args.dsn, "postgres://localhost/helmgate");
            assert_eq!(args.session_ttl_seconds, 600);
            assert_eq!(args.password_max_age_days, 30);
            assert_eq!(
                args.allowed_companies,
                Some(vec!["Acme".to_string(), "Globex".to_string()])
            );
        });
    }
}
