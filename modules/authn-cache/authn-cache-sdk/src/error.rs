//! Error types for authenticators and the authenticator cache.

use thiserror::Error;

use crate::models::AuthenticatorId;

/// Errors an authenticator plugin reports.
#[derive(Debug, Error)]
pub enum AuthenticatorError {
    /// The token is invalid, expired, or not recognized.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The identity provider behind the authenticator could not be reached.
    #[error("authenticator unavailable: {0}")]
    Unavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from authenticating through the cache.
#[derive(Debug, Error)]
pub enum AuthnCacheError {
    /// No authenticator is registered under the requested id.
    #[error("no authenticator registered as {0}")]
    AuthenticatorNotFound(AuthenticatorId),

    #[error(transparent)]
    Authentication(#[from] AuthenticatorError),
}

impl AuthnCacheError {
    /// Whether the caller should be told "not authenticated" rather than
    /// "server fault".
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::AuthenticatorNotFound(_) | Self::Authentication(AuthenticatorError::Unauthorized(_))
        )
    }
}
