//! Error taxonomy shared by the auth flows and guards.
//!
//! Client-visible variants carry generic, non-leaking messages. Anything
//! unexpected collapses into `Internal` and is reported as a generic failure.

use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, checked before any directory access.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or an invalid/expired/missing token. The message never
    /// says which.
    #[error("Invalid credentials")]
    Authentication,

    /// A refresh token carrying a stale token version.
    #[error("Session revoked")]
    SessionRevoked,

    /// The account's roles do not intersect the required set.
    #[error("Not authorized")]
    Authorization,

    #[error("Too many attempts, please try again later")]
    RateLimited,

    /// Duplicate email on registration or email change.
    #[error("Email already in use")]
    Conflict,

    /// Unknown account or single-use token target.
    #[error("Not found")]
    NotFound,

    /// Reset token past its expiry.
    #[error("Token expired")]
    TokenExpired,

    /// Email sender or OAuth provider failure.
    #[error("External service failure")]
    External(#[source] anyhow::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    #[must_use]
    pub fn external(err: impl Into<anyhow::Error>) -> Self {
        Self::External(err.into())
    }
}

impl From<DirectoryError> for AuthError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::EmailTaken => Self::Conflict,
            // A failed precondition means a single-use token was consumed
            // concurrently; to the caller that token no longer exists.
            DirectoryError::NotFound | DirectoryError::PreconditionFailed => Self::NotFound,
            DirectoryError::Unavailable(source) => Self::Internal(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AuthError;

    #[test]
    fn messages_do_not_leak_detail() {
        let err = AuthError::Authentication;
        assert_eq!(err.to_string(), "Invalid credentials");

        let err = AuthError::External(anyhow::anyhow!("smtp: connection refused"));
        assert_eq!(err.to_string(), "External service failure");
    }

    #[test]
    fn validation_keeps_its_message() {
        let err = AuthError::validation("Invalid email address");
        assert_eq!(err.to_string(), "Invalid email address");
    }
}
