use thiserror::Error;

/// Errors building a JWT authenticator from configuration.
#[derive(Debug, Error)]
pub enum JwtConfigError {
    #[error("issuer must not be empty")]
    MissingIssuer,

    #[error("audience must not be empty")]
    MissingAudience,

    #[error("the configured algorithm needs `{field}` to be set")]
    MissingKey { field: &'static str },

    #[error("invalid verification key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}
