#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Certificate authority and credential issuer.
//!
//! [`CertificateAuthority`] owns a root key pair and certificate and signs
//! leaf certificates with it. [`DynamicCertAuthority`] is the credential
//! issuer used by the token exchange: it reads its signing pair from a
//! [`dynamiccert::DynamicCertProvider`] on every call, so key rotation takes
//! effect without rebuilding anything.

pub mod authority;
pub mod dynamic;
pub mod error;
pub mod subject;

pub use authority::{CertificateAuthority, IssuedCertificate};
pub use dynamic::{CertIssuer, DynamicCertAuthority};
pub use error::{CertAuthorityError, IssuerError};
pub use subject::{ExtendedKeyUsage, Subject};
