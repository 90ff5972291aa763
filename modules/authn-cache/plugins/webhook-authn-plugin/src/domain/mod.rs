//! Domain layer for the webhook authenticator plugin.

pub mod client;
pub mod error;
pub mod service;
pub mod token_review;

pub use error::WebhookConfigError;
pub use service::Service;
