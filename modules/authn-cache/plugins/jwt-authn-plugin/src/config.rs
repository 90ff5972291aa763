//! Configuration for the JWT authenticator plugin.

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JwtAuthNPluginConfig {
    /// Required `iss` claim.
    pub issuer: String,

    /// Required `aud` claim.
    pub audience: String,

    /// Signature algorithm tokens must use.
    pub algorithm: Algorithm,

    /// Shared secret for the `HS*` algorithms.
    pub secret: Option<String>,

    /// PEM public key for RSA, EC and `EdDSA` algorithms.
    pub public_key_pem: Option<String>,

    pub claims: ClaimMappings,

    /// Clock skew tolerated on `exp` and `nbf`.
    pub leeway_seconds: u64,
}

impl Default for JwtAuthNPluginConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: String::new(),
            algorithm: Algorithm::RS256,
            secret: None,
            public_key_pem: None,
            claims: ClaimMappings::default(),
            leeway_seconds: 60,
        }
    }
}

/// Which claims carry the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaimMappings {
    pub username: String,
    pub groups: String,
}

impl Default for ClaimMappings {
    fn default() -> Self {
        Self {
            username: "username".to_owned(),
            groups: "groups".to_owned(),
        }
    }
}
