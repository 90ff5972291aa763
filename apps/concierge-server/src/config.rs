//! Server configuration.
//!
//! Defaults, then the YAML file, then `CONCIERGE__`-prefixed environment
//! variables with `__` separating nested keys, e.g.
//! `CONCIERGE__IMPERSONATOR__BIND_ADDRESS=0.0.0.0:9444`.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use authn_cache_sdk::api_group::DEFAULT_SUFFIX;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use impersonator::ImpersonatorConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ENV_PREFIX: &str = "CONCIERGE__";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,

    /// Suffix replacing `concierge.dev` in every API group.
    pub api_group_suffix: String,

    /// Authenticators the cache starts with.
    pub authenticators: Vec<AuthenticatorEntry>,

    /// Serving certificate of the aggregated API. Handshakes are refused
    /// until one is loaded.
    pub serving_certificate: Option<KeyPairFiles>,

    /// CA key pair that signs client certificates. Credential requests are
    /// refused until one is loaded.
    pub signing_key: Option<KeyPairFiles>,

    pub impersonator: ImpersonatorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            api_group_suffix: DEFAULT_SUFFIX.to_owned(),
            authenticators: Vec::new(),
            serving_certificate: None,
            signing_key: None,
            impersonator: ImpersonatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

/// PEM certificate and private key files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyPairFiles {
    pub certificate_file: PathBuf,
    pub private_key_file: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Static,
    Webhook,
    Jwt,
}

impl PluginKind {
    /// Resource kind naming authenticators of this plugin.
    #[must_use]
    pub fn resource_kind(self) -> &'static str {
        match self {
            Self::Static => "StaticAuthenticator",
            Self::Webhook => "WebhookAuthenticator",
            Self::Jwt => "JWTAuthenticator",
        }
    }
}

/// One configured authenticator. Everything besides `type` and `name` is the
/// plugin's own configuration and is validated when the plugin is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorEntry {
    #[serde(rename = "type")]
    pub kind: PluginKind,
    pub name: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// Load the layered configuration.
///
/// # Errors
///
/// Fails if `path` does not exist or any layer does not match [`AppConfig`].
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if let Some(path) = path {
        if !path.is_file() {
            bail!("configuration file {} does not exist", path.display());
        }
        figment = figment.merge(Yaml::file(path));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid configuration")
}
