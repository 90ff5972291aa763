//! Plugin API trait for authenticator implementations.
//!
//! Each authenticator kind (static token map, webhook, JWT issuer) implements
//! this trait. The cache stores instances behind `Arc<dyn Authenticator>` and
//! never needs to know which kind it holds.

use async_trait::async_trait;

use crate::error::AuthenticatorError;
use crate::models::Identity;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate a presented token and return the identity it represents.
    ///
    /// # Arguments
    ///
    /// * `token` - The raw token (without any `Bearer ` prefix)
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the token is invalid, expired, or unknown
    /// - `Unavailable` if the backing identity provider cannot be reached
    /// - `Internal` for unexpected errors
    async fn authenticate_token(&self, token: &str) -> Result<Identity, AuthenticatorError>;
}
