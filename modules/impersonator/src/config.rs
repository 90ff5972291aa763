//! Configuration for the impersonation proxy.

use std::path::PathBuf;
use std::time::Duration;

use authn_cache_sdk::AuthenticatorId;
use serde::{Deserialize, Serialize};

/// Port the proxy listens on. Unprivileged so the proxy does not need root.
pub const DEFAULT_PORT: u16 = 8444;

/// SAN every proxy serving certificate carries.
pub const SERVING_CERT_NAME: &str = "impersonation-proxy";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImpersonatorConfig {
    /// Address the TLS listener binds, e.g. `0.0.0.0:8444`.
    pub bind_address: String,

    /// Authenticator used for plain bearer tokens. Encoded token credential
    /// requests name their own authenticator.
    pub default_authenticator: Option<AuthenticatorId>,

    pub upstream: UpstreamConfig,

    pub serving_certificate: ServingCertificateConfig,
}

impl Default for ImpersonatorConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            default_authenticator: None,
            upstream: UpstreamConfig::default(),
            serving_certificate: ServingCertificateConfig::default(),
        }
    }
}

/// The cluster API server requests are forwarded to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL; request paths are joined under its path.
    pub url: String,

    /// Base64 PEM bundle trusted for the upstream. Native roots when unset.
    pub certificate_authority_data: Option<String>,

    /// File holding the proxy's own bearer token for the upstream, e.g. a
    /// mounted service account token.
    pub bearer_token_file: Option<PathBuf>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "https://kubernetes.default.svc".to_owned(),
            certificate_authority_data: None,
            bearer_token_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServingCertificateConfig {
    pub duration_seconds: u64,
    /// Reissue this long before the current certificate expires.
    pub renew_before_seconds: u64,
    /// SANs in addition to [`SERVING_CERT_NAME`]. IP addresses become IP SANs.
    pub extra_sans: Vec<String>,
}

impl Default for ServingCertificateConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 24 * 60 * 60,
            renew_before_seconds: 60 * 60,
            extra_sans: Vec::new(),
        }
    }
}

impl ServingCertificateConfig {
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    #[must_use]
    pub fn renew_before(&self) -> Duration {
        Duration::from_secs(self.renew_before_seconds)
    }

    /// All SANs a serving certificate is issued for.
    #[must_use]
    pub fn sans(&self) -> Vec<String> {
        let mut sans = vec![SERVING_CERT_NAME.to_owned()];
        for san in &self.extra_sans {
            if !sans.contains(san) {
                sans.push(san.clone());
            }
        }
        sans
    }
}
