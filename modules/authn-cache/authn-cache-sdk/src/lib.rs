//! Authenticator cache SDK
//!
//! This crate provides the public API for the authenticator cache:
//!
//! - [`Authenticator`] - Plugin trait every authenticator kind implements
//! - [`TokenCredentialRequestAuthenticator`] - Capability consumed by the
//!   credential exchange and the impersonation proxy
//! - [`AuthenticatorId`], [`Identity`], [`TokenCredentialRequest`] - Models
//! - [`AuthenticatorError`], [`AuthnCacheError`] - Error types
//! - [`api_group`] - API group naming under a configurable suffix
//!
//! ## Usage
//!
//! ```ignore
//! use authn_cache_sdk::{AuthenticatorId, TokenCredentialRequest};
//!
//! let request = TokenCredentialRequest::new(
//!     "opaque-token",
//!     AuthenticatorId::new("WebhookAuthenticator", "authentication.concierge.dev", "primary"),
//! );
//! let identity = cache.authenticate_token_credential_request(&request).await?;
//! ```

pub mod api;
pub mod api_group;
pub mod error;
pub mod models;
pub mod plugin_api;

pub use api::TokenCredentialRequestAuthenticator;
pub use error::{AuthenticatorError, AuthnCacheError};
pub use models::{AuthenticatorId, Identity, TokenCredentialRequest, TokenCredentialRequestWire};
pub use plugin_api::Authenticator;
