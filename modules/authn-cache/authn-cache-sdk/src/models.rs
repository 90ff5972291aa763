//! Domain models for the authenticator cache.

use std::collections::BTreeSet;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// `kind` of a token credential request in its wire form.
pub const TOKEN_CREDENTIAL_REQUEST_KIND: &str = "TokenCredentialRequest";

/// Identifies one configured authenticator: `(kind, api_group, name)`.
///
/// Serialized as `{"apiGroup": ..., "kind": ..., "name": ...}`; a missing
/// `apiGroup` means the empty group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorId {
    pub kind: String,
    #[serde(default)]
    pub api_group: String,
    pub name: String,
}

impl AuthenticatorId {
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        api_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            api_group: api_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AuthenticatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.api_group.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}.{}/{}", self.kind, self.api_group, self.name)
        }
    }
}

/// A verified principal. Lives only for the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Identity {
    #[must_use]
    pub fn new<I, S>(username: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

/// A token to be authenticated by a named authenticator.
#[derive(Debug)]
pub struct TokenCredentialRequest {
    token: SecretString,
    authenticator: AuthenticatorId,
}

impl TokenCredentialRequest {
    #[must_use]
    pub fn new(token: impl Into<String>, authenticator: AuthenticatorId) -> Self {
        Self {
            token: SecretString::from(token.into()),
            authenticator,
        }
    }

    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    #[must_use]
    pub fn authenticator(&self) -> &AuthenticatorId {
        &self.authenticator
    }

    /// Wire form under the given `apiVersion` (e.g. `login.concierge.dev/v1alpha1`).
    #[must_use]
    pub fn to_wire(&self, api_version: &str) -> TokenCredentialRequestWire {
        TokenCredentialRequestWire {
            api_version: api_version.to_owned(),
            kind: TOKEN_CREDENTIAL_REQUEST_KIND.to_owned(),
            spec: TokenCredentialRequestSpec {
                token: self.token.expose_secret().to_owned(),
                authenticator: self.authenticator.clone(),
            },
        }
    }

    /// Standard base64 of the JSON wire form. Presented as a bearer token,
    /// this lets a caller name the authenticator along with the token.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_encoded_bearer(&self, api_version: &str) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(&self.to_wire(api_version))?;
        Ok(STANDARD.encode(json))
    }

    /// Parse a bearer value produced by [`Self::to_encoded_bearer`].
    ///
    /// Returns `None` for anything that is not base64 of a wire-form request
    /// with the expected `kind`; such values are plain tokens.
    #[must_use]
    pub fn from_encoded_bearer(value: &str) -> Option<Self> {
        let json = STANDARD.decode(value).ok()?;
        let wire: TokenCredentialRequestWire = serde_json::from_slice(&json).ok()?;
        Self::from_wire(wire)
    }

    /// Accepts a wire request of the right `kind`; `apiVersion` is not
    /// checked because the group depends on the deployment's suffix.
    #[must_use]
    pub fn from_wire(wire: TokenCredentialRequestWire) -> Option<Self> {
        if wire.kind != TOKEN_CREDENTIAL_REQUEST_KIND {
            return None;
        }
        Some(Self::new(wire.spec.token, wire.spec.authenticator))
    }
}

/// JSON shape of a token credential request.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCredentialRequestWire {
    pub api_version: String,
    pub kind: String,
    pub spec: TokenCredentialRequestSpec,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenCredentialRequestSpec {
    #[serde(default)]
    pub token: String,
    pub authenticator: AuthenticatorId,
}
