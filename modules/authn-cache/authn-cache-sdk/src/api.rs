//! Public API consumed by the credential exchange and the proxy.

use async_trait::async_trait;

use crate::error::AuthnCacheError;
use crate::models::{Identity, TokenCredentialRequest};

/// Authenticates a token against the authenticator the request names.
///
/// Implemented by the authenticator cache. Every call resolves the
/// authenticator at call time, so a replaced or deleted authenticator takes
/// effect for the next request.
#[async_trait]
pub trait TokenCredentialRequestAuthenticator: Send + Sync {
    /// # Errors
    ///
    /// - `AuthenticatorNotFound` if no authenticator is registered under the
    ///   requested id
    /// - `Authentication` wrapping the plugin's own error otherwise
    async fn authenticate_token_credential_request(
        &self,
        request: &TokenCredentialRequest,
    ) -> Result<Identity, AuthnCacheError>;
}
