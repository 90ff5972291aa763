use thiserror::Error;

/// Errors building a webhook authenticator from configuration.
#[derive(Debug, Error)]
pub enum WebhookConfigError {
    #[error("invalid webhook endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("invalid certificate authority data: {0}")]
    InvalidCertificateAuthority(String),

    #[error("timeout must be at least one second")]
    ZeroTimeout,

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}
