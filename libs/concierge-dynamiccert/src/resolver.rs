//! rustls integration.

use std::sync::Arc;

use rustls::ServerConfig;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use tracing::warn;

use crate::error::DynamicCertError;
use crate::provider::DynamicCertProvider;

/// Resolves the serving certificate from a [`DynamicCertProvider`] on every
/// handshake. Returns no certificate while the provider is unset, which makes
/// rustls abort the handshake.
#[derive(Debug)]
pub struct DynamicCertResolver {
    provider: Arc<DynamicCertProvider>,
}

impl DynamicCertResolver {
    #[must_use]
    pub fn new(provider: Arc<DynamicCertProvider>) -> Self {
        Self { provider }
    }
}

impl ResolvesServerCert for DynamicCertResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let Some(content) = self.provider.current_cert_key_content() else {
            warn!(
                provider = %self.provider.name(),
                sni = ?client_hello.server_name(),
                "refusing TLS handshake: no serving certificate is set"
            );
            return None;
        };
        Some(content.certified_key())
    }
}

/// Build a TLS 1.2+ server configuration whose certificate comes from
/// `provider` at handshake time.
///
/// # Errors
///
/// Returns [`DynamicCertError::Tls`] if the provider's crypto provider does
/// not support the required protocol versions.
pub fn tls_server_config(
    provider: &Arc<DynamicCertProvider>,
    alpn_protocols: Vec<Vec<u8>>,
) -> Result<ServerConfig, DynamicCertError> {
    let mut config = ServerConfig::builder_with_provider(provider.crypto_provider())
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
        .with_no_client_auth()
        .with_cert_resolver(Arc::new(DynamicCertResolver::new(Arc::clone(provider))));
    config.alpn_protocols = alpn_protocols;
    Ok(config)
}
