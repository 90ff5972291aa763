//! Errors for the dynamic certificate provider.

use thiserror::Error;

/// Errors returned when installing certificate material or building TLS
/// configuration from a provider.
#[derive(Debug, Error)]
pub enum DynamicCertError {
    /// The certificate PEM did not contain a usable certificate chain.
    #[error("invalid certificate PEM: {0}")]
    InvalidCertificate(String),

    /// The key PEM did not contain a loadable private key, or the key is not
    /// the one the leaf certificate was issued for.
    #[error("invalid private key PEM: {0}")]
    InvalidPrivateKey(String),

    /// Certificate authority data for a TLS client was unusable.
    #[error("invalid certificate authority data: {0}")]
    InvalidCertificateAuthority(String),

    /// rustls rejected the server configuration.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}
