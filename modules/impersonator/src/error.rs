use thiserror::Error;

/// Errors building or running the impersonation proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream URL {url}: {reason}")]
    InvalidUpstream { url: String, reason: String },

    #[error("invalid upstream certificate authority: {0}")]
    InvalidCertificateAuthority(String),

    #[error("invalid upstream bearer token: {0}")]
    InvalidBearerToken(String),

    #[error("invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("renew_before ({renew_before}s) must be shorter than the certificate duration ({duration}s)")]
    InvalidRenewal { duration: u64, renew_before: u64 },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error(transparent)]
    ServingCertificate(#[from] dynamiccert::DynamicCertError),

    #[error(transparent)]
    CertificateAuthority(#[from] certauthority::CertAuthorityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
