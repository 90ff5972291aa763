use thiserror::Error;

/// Errors from creating, loading or using a [`crate::CertificateAuthority`].
#[derive(Debug, Error)]
pub enum CertAuthorityError {
    #[error("certificate validity must be positive and representable")]
    InvalidValidity,

    #[error("invalid CA material: {0}")]
    InvalidMaterial(String),

    #[error("CA certificate does not match the CA private key")]
    KeyMismatch,

    #[error("OpenSSL error: {0}")]
    Openssl(#[from] openssl::error::ErrorStack),

    #[error("invalid timestamp: {0}")]
    Time(#[from] time::error::ComponentRange),

    #[error("PEM output was not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Errors from a [`crate::CertIssuer`].
#[derive(Debug, Error)]
pub enum IssuerError {
    /// No signing pair is configured yet. Callers should surface this as a
    /// temporary unavailability rather than an authentication failure.
    #[error("certificate signer is not ready")]
    SignerNotReady,

    #[error(transparent)]
    Authority(#[from] CertAuthorityError),
}
