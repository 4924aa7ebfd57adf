//! # Helmgate
//!
//! `helmgate` is a session-based authentication and user-management service
//! for an internal line-of-business application.
//!
//! ## Authentication & Sessions
//!
//! Users authenticate with email and password (bcrypt, cost 12). A successful
//! login opens a server-tracked session identified by an opaque 256-bit token;
//! the database stores only the token's SHA-256 hash. Sessions use a sliding
//! 30-minute idle window: every successful resolution pushes the expiry
//! forward, and an hourly sweep prunes rows whose expiry has passed.
//!
//! Unknown email, wrong password, and disabled account all produce the same
//! `invalid email or password` outcome so responses cannot be used to probe
//! which accounts exist.
//!
//! ## Roles & Authorization
//!
//! Three tiers: `admin` > `manager` > `salesperson`. Admins manage everyone;
//! managers manage (and may only create) salespeople; salespeople manage no
//! one. Only salesperson accounts can be disabled, never one's own.
//!
//! ## Password Lifecycle
//!
//! Passwords expire 30 days after being set. Self-service resets flow through
//! single-use 24-hour tokens; administrators can force-reset with a generated
//! strong password shown exactly once; the background sweeper force-resets
//! expired passwords and accounts inactive for more than 10 days. Every
//! security-relevant action lands in an append-only activity log.

pub mod api;
pub mod auth;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
