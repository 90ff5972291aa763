//! Domain layer for the JWT authenticator plugin.

pub mod client;
pub mod error;
pub mod service;

pub use error::JwtConfigError;
pub use service::Service;
