use std::collections::HashMap;

use async_trait::async_trait;
use authn_cache_sdk::{Authenticator, AuthenticatorError, Identity};
use tracing::debug;

use crate::config::{Mode, StaticAuthNPluginConfig, StaticIdentity};

enum Lookup {
    Anyone(Identity),
    Table(HashMap<String, Identity>),
}

/// Resolves bearer tokens against a fixed, in-memory table.
pub struct StaticAuthenticator {
    lookup: Lookup,
}

impl StaticAuthenticator {
    #[must_use]
    pub fn from_config(cfg: &StaticAuthNPluginConfig) -> Self {
        let lookup = match cfg.mode {
            Mode::AcceptAll => Lookup::Anyone(identity_of(&cfg.default_identity)),
            Mode::StaticTokens => Lookup::Table(
                cfg.tokens
                    .iter()
                    .filter(|entry| !entry.token.is_empty())
                    .map(|entry| (entry.token.clone(), identity_of(&entry.identity)))
                    .collect(),
            ),
        };
        Self { lookup }
    }

    /// `None` for an empty token, and for a token missing from the table.
    #[must_use]
    pub fn lookup(&self, token: &str) -> Option<Identity> {
        if token.is_empty() {
            return None;
        }
        match &self.lookup {
            Lookup::Anyone(identity) => Some(identity.clone()),
            Lookup::Table(table) => table.get(token).cloned(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate_token(&self, token: &str) -> Result<Identity, AuthenticatorError> {
        self.lookup(token).ok_or_else(|| {
            debug!("token not present in static table");
            AuthenticatorError::Unauthorized("invalid token".to_owned())
        })
    }
}

fn identity_of(cfg: &StaticIdentity) -> Identity {
    Identity::new(cfg.username.clone(), cfg.groups.iter().cloned())
}
