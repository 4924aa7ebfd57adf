//! Authentication and authorization error types.

use thiserror::Error;

/// Recoverable outcomes surfaced to the HTTP layer.
///
/// Bad email, bad password, and disabled account are deliberately collapsed
/// into [`AuthError::InvalidCredentials`] so responses never reveal which
/// check failed. Storage and entropy failures surface as the opaque
/// [`AuthError::Internal`] variant and are logged server-side only.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password has expired")]
    PasswordExpired,

    #[error("invalid session")]
    InvalidSession,

    #[error("invalid or expired session")]
    InvalidOrExpiredSession,

    #[error("user account is disabled")]
    UserDisabled,

    #[error("password must be at least 6 characters long")]
    WeakPassword,

    #[error("invalid or expired reset token")]
    InvalidOrExpiredToken,

    #[error("not found")]
    NotFound,

    #[error("insufficient permissions")]
    PermissionDenied,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::AuthError;

    #[test]
    fn credential_failures_share_one_message() {
        // Unknown email, wrong password, and disabled account must be
        // indistinguishable to callers.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "invalid email or password"
        );
    }

    #[test]
    fn internal_errors_wrap_their_source() {
        let err = AuthError::from(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, AuthError::Internal(_)));
        assert_eq!(err.to_string(), "connection refused");
    }
}
