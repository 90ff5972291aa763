use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use authn_cache_sdk::{
    Authenticator, AuthenticatorId, AuthnCacheError, Identity, TokenCredentialRequest,
    TokenCredentialRequestAuthenticator,
};
use secrecy::ExposeSecret;
use tracing::{debug, info};

type AuthenticatorMap = HashMap<AuthenticatorId, Arc<dyn Authenticator>>;

/// Registry of live authenticators.
///
/// The map is an immutable snapshot behind an atomically swapped pointer.
/// Readers clone the `Arc` of the entry they need and release the snapshot
/// before calling into the plugin; writers copy the map, modify the copy and
/// swap it in.
#[derive(Default)]
pub struct AuthenticatorCache {
    entries: ArcSwap<AuthenticatorMap>,
}

impl AuthenticatorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Authenticator currently registered under `id`.
    #[must_use]
    pub fn get(&self, id: &AuthenticatorId) -> Option<Arc<dyn Authenticator>> {
        self.entries.load().get(id).cloned()
    }

    /// Register `authenticator` under `id`, replacing any previous entry.
    pub fn store(&self, id: AuthenticatorId, authenticator: Arc<dyn Authenticator>) {
        let previous = self.entries.rcu(|current| {
            let mut next = AuthenticatorMap::clone(current);
            next.insert(id.clone(), Arc::clone(&authenticator));
            next
        });
        info!(
            authenticator = %id,
            replaced = previous.contains_key(&id),
            "stored authenticator"
        );
    }

    /// Remove the entry for `id`. Returns whether one was present.
    pub fn delete(&self, id: &AuthenticatorId) -> bool {
        let previous = self.entries.rcu(|current| {
            let mut next = AuthenticatorMap::clone(current);
            next.remove(id);
            next
        });
        let removed = previous.contains_key(id);
        if removed {
            info!(authenticator = %id, "deleted authenticator");
        }
        removed
    }

    /// Registered ids in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<AuthenticatorId> {
        let mut keys: Vec<_> = self.entries.load().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl fmt::Debug for AuthenticatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorCache")
            .field("keys", &self.keys())
            .finish()
    }
}

#[async_trait]
impl TokenCredentialRequestAuthenticator for AuthenticatorCache {
    async fn authenticate_token_credential_request(
        &self,
        request: &TokenCredentialRequest,
    ) -> Result<Identity, AuthnCacheError> {
        let id = request.authenticator();
        let Some(authenticator) = self.get(id) else {
            debug!(authenticator = %id, "no authenticator registered for request");
            return Err(AuthnCacheError::AuthenticatorNotFound(id.clone()));
        };

        Ok(authenticator
            .authenticate_token(request.token().expose_secret())
            .await?)
    }
}
