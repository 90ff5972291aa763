use thiserror::Error;

/// Errors returned to the caller of the exchange instead of a status.
///
/// Authentication failures are not errors: they produce a status carrying
/// a failure message.
#[derive(Debug, Error)]
pub enum CredentialRequestError {
    /// The request itself is malformed or asks for something unsupported.
    #[error("invalid token credential request: {0}")]
    Invalid(String),

    /// The exchange cannot be served right now; retrying later may succeed.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("cannot make api group from {base_group}/{suffix}")]
    InvalidApiGroup { base_group: String, suffix: String },
}

impl CredentialRequestError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
