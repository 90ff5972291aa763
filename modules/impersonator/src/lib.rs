#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Impersonation proxy
//!
//! A TLS reverse proxy in front of the cluster API server. Callers present a
//! bearer token; the proxy authenticates it through the authenticator cache,
//! strips the caller's credential and any impersonation headers it sent, and
//! forwards the request upstream with `Impersonate-User` and
//! `Impersonate-Group` set to the verified identity.
//!
//! ```yaml
//! impersonator:
//!   bind_address: "0.0.0.0:8444"
//!   default_authenticator:
//!     kind: WebhookAuthenticator
//!     apiGroup: authentication.concierge.dev
//!     name: primary
//!   upstream:
//!     url: "https://kubernetes.default.svc"
//!     bearer_token_file: /var/run/secrets/kubernetes.io/serviceaccount/token
//!   serving_certificate:
//!     duration_seconds: 86400
//!     renew_before_seconds: 3600
//! ```
//!
//! The serving certificate lives in a [`dynamiccert::DynamicCertProvider`];
//! [`ServingCertManager`] issues and renews it, and [`ProxyServer`] reads it
//! on every handshake.

pub mod config;
mod credential;
pub mod error;
pub mod headers;
pub mod proxy;
pub mod server;
pub mod serving_cert;
pub mod status;
pub mod upstream;

pub use config::{ImpersonatorConfig, ServingCertificateConfig, UpstreamConfig};
pub use error::ProxyError;
pub use proxy::ImpersonationProxy;
pub use server::ProxyServer;
pub use serving_cert::ServingCertManager;
pub use status::Status;
pub use upstream::Upstream;
