use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use authn_cache_sdk::{TokenCredentialRequest, TokenCredentialRequestAuthenticator};
use certauthority::{CertIssuer, IssuerError};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

use crate::error::CredentialRequestError;
use crate::models::{ClusterCredential, CreateOptions, TokenCredentialRequestStatus};

/// Lifetime of every client certificate handed out by the exchange.
pub const CLIENT_CERTIFICATE_TTL: Duration = Duration::from_secs(5 * 60);

/// Exchanges authenticated tokens for short-lived client certificates.
#[derive(Clone)]
pub struct CredentialRequestService {
    authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
    issuer: Arc<dyn CertIssuer>,
    ttl: Duration,
}

impl CredentialRequestService {
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
        issuer: Arc<dyn CertIssuer>,
    ) -> Self {
        Self {
            authenticator,
            issuer,
            ttl: CLIENT_CERTIFICATE_TTL,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Authenticate `request` and issue a client certificate for the
    /// resulting identity.
    ///
    /// Authentication failures, including an unknown authenticator and an
    /// identity without a username, yield `Ok` with a failure status.
    ///
    /// # Errors
    ///
    /// - `Invalid` if the token is empty or `dry_run` is requested
    /// - `ServiceUnavailable` if no signing key is configured yet
    #[tracing::instrument(skip_all, fields(authenticator = %request.authenticator()))]
    pub async fn create(
        &self,
        request: &TokenCredentialRequest,
        options: CreateOptions,
    ) -> Result<TokenCredentialRequestStatus, CredentialRequestError> {
        if request.token().expose_secret().is_empty() {
            return Err(CredentialRequestError::invalid(
                "spec.token.value: required value",
            ));
        }
        if options.dry_run {
            return Err(CredentialRequestError::invalid("dryRun not supported"));
        }

        let identity = match self
            .authenticator
            .authenticate_token_credential_request(request)
            .await
        {
            Ok(identity) if identity.username.is_empty() => {
                debug!("authenticator returned an identity without a username");
                return Ok(TokenCredentialRequestStatus::authentication_failed());
            }
            Ok(identity) => identity,
            Err(e) if e.is_unauthenticated() => {
                debug!(error = %e, "token rejected");
                return Ok(TokenCredentialRequestStatus::authentication_failed());
            }
            Err(e) => {
                warn!(error = %e, "authenticator could not decide");
                return Ok(TokenCredentialRequestStatus::authentication_failed());
            }
        };

        let groups: Vec<String> = identity.groups.iter().cloned().collect();
        let issued = match self
            .issuer
            .issue_client_cert_pem(&identity.username, &groups, self.ttl)
        {
            Ok(issued) => issued,
            Err(IssuerError::SignerNotReady) => {
                warn!("client certificate signer is not ready");
                return Err(CredentialRequestError::ServiceUnavailable(
                    IssuerError::SignerNotReady.to_string(),
                ));
            }
            Err(e) => {
                error!(error = %e, username = %identity.username, "failed to issue client certificate");
                return Ok(TokenCredentialRequestStatus::authentication_failed());
            }
        };

        info!(
            username = %identity.username,
            groups = groups.len(),
            expires = %issued.not_after,
            "issued client certificate"
        );
        Ok(TokenCredentialRequestStatus::success(ClusterCredential {
            expiration_timestamp: issued.not_after,
            client_certificate_data: issued.cert_pem,
            client_key_data: issued.key_pem,
        }))
    }
}

impl fmt::Debug for CredentialRequestService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRequestService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
