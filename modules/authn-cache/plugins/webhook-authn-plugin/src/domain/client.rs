//! `Authenticator` implementation for the webhook plugin.

use async_trait::async_trait;
use authn_cache_sdk::{Authenticator, AuthenticatorError, Identity};

use super::service::Service;

#[async_trait]
impl Authenticator for Service {
    async fn authenticate_token(&self, token: &str) -> Result<Identity, AuthenticatorError> {
        self.review(token).await
    }
}
