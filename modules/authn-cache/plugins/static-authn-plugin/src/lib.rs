#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Authenticator backed by tokens written into the configuration file.
//!
//! Meant for development clusters and tests, where standing up a webhook or
//! an OIDC issuer is not worth it. With `mode: accept_all` (the default)
//! every non-empty token yields `default_identity`; with
//! `mode: static_tokens` only listed tokens are accepted.
//!
//! ```yaml
//! authenticators:
//!   - type: static
//!     name: dev
//!     mode: static_tokens
//!     tokens:
//!       - token: "good-token"
//!         identity:
//!           username: alice
//!           groups: ["admins"]
//! ```

mod authenticator;
pub mod config;

pub use authenticator::StaticAuthenticator;
pub use config::StaticAuthNPluginConfig;
