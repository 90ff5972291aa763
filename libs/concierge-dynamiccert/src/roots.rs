//! Trust roots for outbound TLS clients.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use tracing::{debug, warn};

use crate::error::DynamicCertError;

/// Build the root store a client uses to verify its peer.
///
/// `ca_data` is base64 of a PEM bundle, as in a kubeconfig
/// `certificate-authority-data` field. Without it the platform's native roots
/// are loaded; unreadable native certificates are logged and skipped.
///
/// # Errors
///
/// Returns [`DynamicCertError::InvalidCertificateAuthority`] if `ca_data` is
/// not base64, holds malformed PEM, or holds no certificate at all.
pub fn root_store(ca_data: Option<&str>) -> Result<RootCertStore, DynamicCertError> {
    let mut roots = RootCertStore::empty();

    let Some(ca_data) = ca_data else {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            warn!(error = %error, "could not load a native root certificate");
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!(added, ignored, "loaded native root certificates");
        return Ok(roots);
    };

    let pem = STANDARD.decode(ca_data.trim()).map_err(|e| invalid(&e))?;
    for cert in CertificateDer::pem_slice_iter(&pem) {
        roots.add(cert.map_err(|e| invalid(&e))?).map_err(|e| invalid(&e))?;
    }
    if roots.is_empty() {
        return Err(invalid(&"no certificates found"));
    }
    Ok(roots)
}

fn invalid(e: &impl fmt::Display) -> DynamicCertError {
    DynamicCertError::InvalidCertificateAuthority(e.to_string())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn encoded_bundle(count: usize) -> String {
        let pem: String = (0..count)
            .map(|i| {
                rcgen::generate_simple_self_signed(vec![format!("ca{i}.example.com")])
                    .unwrap()
                    .cert
                    .pem()
            })
            .collect();
        STANDARD.encode(pem)
    }

    #[test]
    fn every_certificate_in_the_bundle_is_trusted() {
        let roots = root_store(Some(&encoded_bundle(2))).unwrap();
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let data = format!("  {}\n", encoded_bundle(1));
        assert_eq!(root_store(Some(&data)).unwrap().len(), 1);
    }

    #[test]
    fn unusable_data_is_rejected() {
        for data in ["%%%".to_owned(), STANDARD.encode("no pem in here")] {
            let err = root_store(Some(&data)).unwrap_err();
            assert!(matches!(err, DynamicCertError::InvalidCertificateAuthority(_)));
        }
    }
}
