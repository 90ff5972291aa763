#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Token credential exchange.
//!
//! [`CredentialRequestService`] is what the login API endpoint calls for
//! every `TokenCredentialRequest`: it authenticates the token through a
//! [`TokenCredentialRequestAuthenticator`] and, on success, asks a
//! [`CertIssuer`] for a short-lived client certificate bound to the verified
//! identity.
//!
//! [`AggregatedServerConfig`] bundles everything the aggregated API server
//! needs from this workspace.
//!
//! [`TokenCredentialRequestAuthenticator`]: authn_cache_sdk::TokenCredentialRequestAuthenticator
//! [`CertIssuer`]: certauthority::CertIssuer

pub mod domain;
pub mod error;
pub mod models;
pub mod wiring;

pub use domain::service::{CLIENT_CERTIFICATE_TTL, CredentialRequestService};
pub use error::CredentialRequestError;
pub use models::{ClusterCredential, CreateOptions, TokenCredentialRequestStatus};
pub use wiring::{AggregatedServerConfig, DEFAULT_BIND_PORT};
