//! Periodic maintenance: prune expired sessions and force policy-driven
//! password resets.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

use super::reset::PasswordResetService;
use super::sessions::SessionStore;

/// Spawn the background sweeper.
///
/// Runs fully decoupled from request handling. Each job failure is logged and
/// the loop keeps going; per-row isolation inside the password sweeps means a
/// bad record cannot stall the rest of a batch either.
pub fn spawn_sweeper(
    sessions: SessionStore,
    resets: PasswordResetService,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match sessions.sweep_expired().await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "pruned expired sessions"),
                Err(err) => error!("failed to sweep expired sessions: {err}"),
            }

            match resets.auto_reset_expired_passwords().await {
                Ok(0) => {}
                Ok(reset_count) => info!(reset_count, "reset expired passwords"),
                Err(err) => error!("failed to reset expired passwords: {err}"),
            }

            match resets.auto_reset_inactive_users().await {
                Ok(0) => {}
                Ok(reset_count) => info!(reset_count, "reset inactive users"),
                Err(err) => error!("failed to reset inactive users: {err}"),
            }
        }
    })
}
