//! Mutable certificate/key cell.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use rustls::crypto::CryptoProvider;
use rustls::sign::CertifiedKey;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::DynamicCertError;

/// One complete certificate chain and private key.
///
/// Instances are immutable; a provider swaps whole instances, so a reader
/// holding an `Arc<CertKeyContent>` always sees a chain and key that were
/// installed by the same `set` call.
pub struct CertKeyContent {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    name: Option<String>,
    certified_key: Arc<CertifiedKey>,
}

impl CertKeyContent {
    /// PEM encoded certificate chain, leaf first.
    #[must_use]
    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    /// PEM encoded private key.
    #[must_use]
    pub fn key_pem(&self) -> &[u8] {
        &self.key_pem
    }

    /// Optional label supplied by whoever installed the pair.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The chain and signing key in the form rustls serves them.
    #[must_use]
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified_key)
    }

    /// DER encoding of the leaf certificate.
    #[must_use]
    pub fn leaf_der(&self) -> Option<&CertificateDer<'static>> {
        self.certified_key.cert.first()
    }
}

impl fmt::Debug for CertKeyContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertKeyContent")
            .field("name", &self.name)
            .field("chain_len", &self.certified_key.cert.len())
            .finish_non_exhaustive()
    }
}

/// Thread-safe holder of the current serving or signing pair.
///
/// Readers never block: the value lives behind an atomically swapped
/// pointer. Writers validate the new material before the swap, so an invalid
/// `set` leaves the previous value in place.
pub struct DynamicCertProvider {
    name: String,
    current: ArcSwapOption<CertKeyContent>,
    crypto: Arc<CryptoProvider>,
    generation: watch::Sender<u64>,
}

impl DynamicCertProvider {
    /// Create an empty provider using the aws-lc-rs crypto provider.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_crypto_provider(name, Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
    }

    /// Create an empty provider that loads keys with the given crypto provider.
    #[must_use]
    pub fn with_crypto_provider(name: impl Into<String>, crypto: Arc<CryptoProvider>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            name: name.into(),
            current: ArcSwapOption::from(None),
            crypto,
            generation,
        }
    }

    /// Name given at construction, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Crypto provider used to load private keys; TLS configs built on top of
    /// this provider should use the same one.
    #[must_use]
    pub fn crypto_provider(&self) -> Arc<CryptoProvider> {
        Arc::clone(&self.crypto)
    }

    /// Current pair, or `None` while unset.
    #[must_use]
    pub fn current_cert_key_content(&self) -> Option<Arc<CertKeyContent>> {
        self.current.load_full()
    }

    /// Whether a pair is currently installed.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.current.load().is_some()
    }

    /// Replace the current pair.
    ///
    /// # Errors
    ///
    /// Returns [`DynamicCertError::InvalidCertificate`] if `cert_pem` holds no
    /// certificate and [`DynamicCertError::InvalidPrivateKey`] if `key_pem`
    /// holds no loadable private key or one that does not match the leaf.
    /// The previous value is kept on error.
    pub fn set(
        &self,
        cert_pem: &[u8],
        key_pem: &[u8],
        name: Option<&str>,
    ) -> Result<(), DynamicCertError> {
        let content = parse(cert_pem, key_pem, name, &self.crypto)?;
        self.current.store(Some(Arc::new(content)));
        self.generation.send_modify(|generation| *generation += 1);
        info!(provider = %self.name, content_name = ?name, "certificate and key installed");
        Ok(())
    }

    /// Clear the current pair. Unsetting an empty provider is a no-op.
    pub fn unset(&self) {
        if self.current.swap(None).is_some() {
            self.generation.send_modify(|generation| *generation += 1);
            info!(provider = %self.name, "certificate and key removed");
        } else {
            debug!(provider = %self.name, "unset on an empty provider");
        }
    }

    /// Subscribe to change notifications.
    ///
    /// The channel carries a generation counter bumped on every change.
    /// Consumers should still read [`Self::current_cert_key_content`] rather
    /// than rely on the notification for the value itself.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

impl fmt::Debug for DynamicCertProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCertProvider")
            .field("name", &self.name)
            .field("current", &self.current.load().as_deref())
            .finish_non_exhaustive()
    }
}

fn parse(
    cert_pem: &[u8],
    key_pem: &[u8],
    name: Option<&str>,
    crypto: &CryptoProvider,
) -> Result<CertKeyContent, DynamicCertError> {
    let chain = CertificateDer::pem_slice_iter(cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DynamicCertError::InvalidCertificate(e.to_string()))?;
    if chain.is_empty() {
        return Err(DynamicCertError::InvalidCertificate(
            "no CERTIFICATE block found".to_owned(),
        ));
    }

    let key = PrivateKeyDer::from_pem_slice(key_pem)
        .map_err(|e| DynamicCertError::InvalidPrivateKey(e.to_string()))?;
    let signing_key = crypto
        .key_provider
        .load_private_key(key)
        .map_err(|e| DynamicCertError::InvalidPrivateKey(e.to_string()))?;

    let certified_key = CertifiedKey::new(chain, signing_key);
    certified_key.keys_match().map_err(|e| {
        DynamicCertError::InvalidPrivateKey(format!("does not match the certificate: {e}"))
    })?;

    Ok(CertKeyContent {
        cert_pem: cert_pem.to_vec(),
        key_pem: key_pem.to_vec(),
        name: name.map(str::to_owned),
        certified_key: Arc::new(certified_key),
    })
}
