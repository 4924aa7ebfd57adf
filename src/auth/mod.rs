//! Authentication, sessions, and role-scoped user management.
//!
//! The pieces layer bottom-up: [`credentials`] (hashing, tokens, validation)
//! and [`roles`] (hierarchy + predicates) are pure; [`users`], [`sessions`],
//! and [`activity`] wrap the database; [`service`] and [`reset`] orchestrate
//! them; [`sweeper`] runs the periodic maintenance jobs. Everything is
//! constructed explicitly at startup and handed down; there is no ambient
//! global state.

pub mod activity;
pub mod config;
pub mod credentials;
pub mod error;
pub mod reset;
pub mod roles;
pub mod service;
pub mod sessions;
pub mod sweeper;
pub mod users;

pub use activity::{ActivityKind, ActivityLog, ActivityRecord};
pub use config::AuthConfig;
pub use error::AuthError;
pub use reset::{PasswordResetService, ResetEvent, ResetType};
pub use roles::{Role, can_disable, can_manage};
pub use service::{AuthService, LoginOutcome};
pub use sessions::{Session, SessionStore};
pub use users::{NewUser, SaveOutcome, User, UserChanges, UserFilter, UserStore};
