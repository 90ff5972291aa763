#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Webhook authenticator plugin
//!
//! Delegates token validation to a remote service speaking the
//! `authentication.k8s.io/v1` `TokenReview` protocol: the token is POSTed in a
//! `TokenReview` and the reply's `status` decides the outcome.
//!
//! ## Configuration
//!
//! ```yaml
//! authenticators:
//!   - type: webhook
//!     name: primary
//!     endpoint: "https://idp.example.com/authenticate"
//!     certificate_authority_data: "LS0tLS1CRUdJTi..."   # base64 PEM, optional
//!     timeout_seconds: 10
//! ```

pub mod config;
pub mod domain;

pub use config::WebhookAuthNPluginConfig;
pub use domain::{Service as WebhookAuthenticator, WebhookConfigError};
