//! Settings accepted by the static authenticator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticAuthNPluginConfig {
    pub mode: Mode,

    /// Who every caller becomes under [`Mode::AcceptAll`].
    pub default_identity: StaticIdentity,

    /// Consulted only under [`Mode::StaticTokens`].
    pub tokens: Vec<StaticToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    AcceptAll,
    StaticTokens,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticIdentity {
    pub username: String,
    pub groups: Vec<String>,
}

impl Default for StaticIdentity {
    fn default() -> Self {
        Self {
            username: "developer".to_owned(),
            groups: Vec::new(),
        }
    }
}

/// One bearer token and the user it stands for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticToken {
    pub token: String,
    pub identity: StaticIdentity,
}
