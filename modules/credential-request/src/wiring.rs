//! Capabilities handed to the aggregated API server.

use std::fmt;
use std::sync::Arc;

use authn_cache_sdk::TokenCredentialRequestAuthenticator;
use authn_cache_sdk::api_group::{self, LOGIN_GROUP, LOGIN_VERSION};
use certauthority::CertIssuer;
use dynamiccert::DynamicCertProvider;

use crate::domain::service::CredentialRequestService;
use crate::error::CredentialRequestError;

/// Port the aggregated API server listens on. Unprivileged so the server
/// does not need root.
pub const DEFAULT_BIND_PORT: u16 = 8443;

/// Everything the aggregated API server consumes from this workspace.
///
/// The server terminates TLS with [`Self::serving_cert_provider`]; while that
/// provider is unset, handshakes are refused. The login endpoint delegates to
/// [`Self::credential_request_service`].
#[derive(Clone)]
pub struct AggregatedServerConfig {
    pub api_group: String,
    /// Storage prefix for the login group. Storage is not used today; the
    /// prefix is kept so it is correct if storage is enabled.
    pub etcd_path_prefix: String,
    pub bind_port: u16,
    pub serving_cert_provider: Arc<DynamicCertProvider>,
    pub authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
    pub issuer: Arc<dyn CertIssuer>,
}

impl AggregatedServerConfig {
    /// # Errors
    ///
    /// Returns [`CredentialRequestError::InvalidApiGroup`] if the login group
    /// cannot be renamed under `api_group_suffix`.
    pub fn new(
        serving_cert_provider: Arc<DynamicCertProvider>,
        authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
        issuer: Arc<dyn CertIssuer>,
        api_group_suffix: &str,
    ) -> Result<Self, CredentialRequestError> {
        let api_group = api_group::make(LOGIN_GROUP, api_group_suffix).ok_or_else(|| {
            CredentialRequestError::InvalidApiGroup {
                base_group: LOGIN_GROUP.to_owned(),
                suffix: api_group_suffix.to_owned(),
            }
        })?;

        Ok(Self {
            etcd_path_prefix: format!("/registry/{api_group}"),
            api_group,
            bind_port: DEFAULT_BIND_PORT,
            serving_cert_provider,
            authenticator,
            issuer,
        })
    }

    /// `apiVersion` clients use for token credential requests.
    #[must_use]
    pub fn api_version(&self) -> String {
        format!("{}/{LOGIN_VERSION}", self.api_group)
    }

    #[must_use]
    pub fn credential_request_service(&self) -> CredentialRequestService {
        CredentialRequestService::new(Arc::clone(&self.authenticator), Arc::clone(&self.issuer))
    }
}

impl fmt::Debug for AggregatedServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatedServerConfig")
            .field("api_group", &self.api_group)
            .field("etcd_path_prefix", &self.etcd_path_prefix)
            .field("bind_port", &self.bind_port)
            .field("serving_cert_provider", &self.serving_cert_provider.name())
            .finish_non_exhaustive()
    }
}
