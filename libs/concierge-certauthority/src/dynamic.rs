//! Client credential issuance backed by a hot-swappable signing pair.

use std::sync::Arc;
use std::time::Duration;

use dynamiccert::DynamicCertProvider;
use tracing::debug;

use crate::authority::{CertificateAuthority, IssuedCertificate};
use crate::error::IssuerError;
use crate::subject::Subject;

/// Issues short-lived client certificates that identify a user to the
/// cluster: `CN=<username>`, one `O=<group>` per group.
pub trait CertIssuer: Send + Sync {
    /// # Errors
    ///
    /// Returns [`IssuerError::SignerNotReady`] when no signing material is
    /// available and [`IssuerError::Authority`] when signing fails.
    fn issue_client_cert_pem(
        &self,
        username: &str,
        groups: &[String],
        ttl: Duration,
    ) -> Result<IssuedCertificate, IssuerError>;
}

impl CertIssuer for CertificateAuthority {
    fn issue_client_cert_pem(
        &self,
        username: &str,
        groups: &[String],
        ttl: Duration,
    ) -> Result<IssuedCertificate, IssuerError> {
        let subject = Subject::new(username).with_organizations(groups.iter().cloned());
        Ok(self.issue(&subject, &[], &[], ttl)?)
    }
}

/// Credential issuer that signs with whatever pair the provider currently
/// holds. The provider is read on every call.
#[derive(Debug, Clone)]
pub struct DynamicCertAuthority {
    provider: Arc<DynamicCertProvider>,
}

impl DynamicCertAuthority {
    #[must_use]
    pub fn new(provider: Arc<DynamicCertProvider>) -> Self {
        Self { provider }
    }
}

impl CertIssuer for DynamicCertAuthority {
    fn issue_client_cert_pem(
        &self,
        username: &str,
        groups: &[String],
        ttl: Duration,
    ) -> Result<IssuedCertificate, IssuerError> {
        let Some(signer) = self.provider.current_cert_key_content() else {
            debug!(provider = %self.provider.name(), "no signing certificate configured");
            return Err(IssuerError::SignerNotReady);
        };
        let authority = CertificateAuthority::load(signer.cert_pem(), signer.key_pem())?;
        authority.issue_client_cert_pem(username, groups, ttl)
    }
}
