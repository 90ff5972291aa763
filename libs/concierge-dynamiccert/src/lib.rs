#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Dynamic certificate provider.
//!
//! A [`DynamicCertProvider`] holds at most one certificate chain and private
//! key. The value is replaced wholesale by an external mutator and read on
//! every TLS handshake through [`DynamicCertResolver`]. While nothing is set
//! the resolver yields no certificate, so handshakes are refused instead of
//! being served with a stale or unrelated identity.
//!
//! [`root_store`] builds the matching trust anchors for outbound clients
//! from kubeconfig-style base64 CA data.
//!
//! ```ignore
//! let provider = Arc::new(DynamicCertProvider::new("impersonation-proxy-serving-cert"));
//! let tls = dynamiccert::tls_server_config(&provider, vec![b"http/1.1".to_vec()])?;
//!
//! // later, from a reconciler
//! provider.set(&cert_pem, &key_pem, Some("rotated"))?;
//! ```

pub mod error;
pub mod provider;
pub mod resolver;
pub mod roots;

pub use error::DynamicCertError;
pub use provider::{CertKeyContent, DynamicCertProvider};
pub use resolver::{DynamicCertResolver, tls_server_config};
pub use roots::root_store;
