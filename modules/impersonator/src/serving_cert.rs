//! Self-managed serving certificate for the proxy.
//!
//! The proxy signs its own serving certificate with an in-memory CA and keeps
//! it fresh: a renewal task reissues it `renew_before` ahead of expiry. The CA
//! is replaced once it would no longer cover a full certificate lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use certauthority::{CertificateAuthority, IssuedCertificate, Subject};
use dynamiccert::DynamicCertProvider;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::{SERVING_CERT_NAME, ServingCertificateConfig};
use crate::error::ProxyError;

/// Common name of the proxy's signing CA.
pub const PROXY_CA_NAME: &str = "impersonation proxy CA";

/// CA lifetime in serving certificate lifetimes.
const CA_LIFETIMES: u32 = 10;

const RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// Issues the proxy's serving certificate into its provider.
pub struct ServingCertManager {
    provider: Arc<DynamicCertProvider>,
    config: ServingCertificateConfig,
    ca: CertificateAuthority,
    ca_expires: Instant,
}

impl ServingCertManager {
    /// Create the signing CA.
    ///
    /// # Errors
    ///
    /// Fails if `renew_before` is not shorter than the certificate duration
    /// or the CA cannot be created.
    pub fn new(
        provider: Arc<DynamicCertProvider>,
        config: ServingCertificateConfig,
    ) -> Result<Self, ProxyError> {
        if config.renew_before_seconds >= config.duration_seconds {
            return Err(ProxyError::InvalidRenewal {
                duration: config.duration_seconds,
                renew_before: config.renew_before_seconds,
            });
        }
        let (ca, ca_expires) = new_ca(&config)?;
        Ok(Self {
            provider,
            config,
            ca,
            ca_expires,
        })
    }

    /// PEM of the CA currently signing serving certificates.
    #[must_use]
    pub fn ca_bundle_pem(&self) -> &str {
        self.ca.ca_bundle_pem()
    }

    /// Issue a serving certificate and install it in the provider.
    ///
    /// # Errors
    ///
    /// Fails if issuing or installing the certificate fails; the provider
    /// keeps its previous value.
    pub fn issue(&mut self) -> Result<IssuedCertificate, ProxyError> {
        let duration = self.config.duration();
        if self.ca_expires < Instant::now() + duration {
            let (ca, ca_expires) = new_ca(&self.config)?;
            info!("rotated impersonation proxy CA");
            self.ca = ca;
            self.ca_expires = ca_expires;
        }

        let issued = self.ca.issue(
            &Subject::new(SERVING_CERT_NAME),
            &self.config.sans(),
            &[],
            duration,
        )?;
        self.provider.set(
            issued.cert_pem.as_bytes(),
            issued.key_pem.as_bytes(),
            Some(SERVING_CERT_NAME),
        )?;
        info!(
            provider = %self.provider.name(),
            not_after = %issued.not_after,
            "issued impersonation proxy serving certificate"
        );
        Ok(issued)
    }

    fn renewal_interval(&self) -> Duration {
        self.config
            .duration()
            .saturating_sub(self.config.renew_before())
    }

    /// Reissue the certificate `renew_before` ahead of expiry until
    /// `cancel` fires. Failed attempts are retried.
    pub async fn run_renewal(mut self, cancel: CancellationToken) {
        let mut wait = self.renewal_interval();
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("serving certificate renewal stopped");
                    return;
                }
                () = tokio::time::sleep(wait) => {}
            }

            wait = match self.issue() {
                Ok(_) => self.renewal_interval(),
                Err(e) => {
                    error!(error = %e, "failed to renew impersonation proxy serving certificate");
                    RETRY_INTERVAL
                }
            };
        }
    }
}

fn new_ca(config: &ServingCertificateConfig) -> Result<(CertificateAuthority, Instant), ProxyError> {
    let validity = config.duration().saturating_mul(CA_LIFETIMES);
    let ca = CertificateAuthority::new(&Subject::new(PROXY_CA_NAME), validity)?;
    Ok((ca, Instant::now() + validity))
}
