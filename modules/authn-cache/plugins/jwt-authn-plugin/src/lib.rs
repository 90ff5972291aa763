#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! JWT authenticator plugin
//!
//! Validates signed JWTs issued by a single configured issuer for a single
//! audience, and maps configured claims to the username and groups.
//!
//! ```yaml
//! authenticators:
//!   - type: jwt
//!     name: corp-idp
//!     issuer: "https://idp.example.com"
//!     audience: "concierge"
//!     algorithm: ES256
//!     public_key_pem: |
//!       -----BEGIN PUBLIC KEY-----
//!       ...
//!     claims:
//!       username: email
//!       groups: groups
//! ```

pub mod config;
pub mod domain;

pub use config::JwtAuthNPluginConfig;
pub use domain::{JwtConfigError, Service as JwtAuthenticator};
