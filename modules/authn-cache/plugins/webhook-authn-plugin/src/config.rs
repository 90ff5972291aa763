//! Configuration for the webhook authenticator plugin.

use serde::{Deserialize, Serialize};

/// Plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookAuthNPluginConfig {
    /// URL the `TokenReview` is POSTed to. Should be `https`.
    pub endpoint: String,

    /// Base64 encoded PEM bundle trusted for the endpoint. The platform's
    /// native roots are used when absent.
    pub certificate_authority_data: Option<String>,

    /// Upper bound for one review, connection included.
    pub timeout_seconds: u64,
}

impl Default for WebhookAuthNPluginConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            certificate_authority_data: None,
            timeout_seconds: 10,
        }
    }
}
