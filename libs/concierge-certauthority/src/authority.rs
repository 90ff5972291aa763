//! Root key pair and leaf issuance.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Builder, X509Ref};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::CertAuthorityError;
use crate::subject::{ExtendedKeyUsage, Subject, extended_key_usage_extension};

/// Every certificate is valid from slightly before its issuance so that
/// peers with a lagging clock accept it immediately.
const CLOCK_SKEW_BACKDATE: time::Duration = time::Duration::minutes(5);

const SERIAL_BITS: i32 = 128;

/// A signed leaf certificate and its freshly generated private key.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// An in-memory root CA. Immutable once built; issuing does not change it.
pub struct CertificateAuthority {
    cert: X509,
    key: PKey<Private>,
    cert_pem: String,
}

impl CertificateAuthority {
    /// Generate a new self-signed root.
    ///
    /// # Errors
    ///
    /// Fails if `validity` is zero or too large to represent, or if key
    /// generation or signing fails.
    pub fn new(subject: &Subject, validity: Duration) -> Result<Self, CertAuthorityError> {
        let window = ValidityWindow::starting_now(validity)?;
        let key = generate_key()?;
        let name = subject.to_x509_name()?;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_serial_number(&*random_serial()?)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        window.apply(&mut builder)?;
        builder.set_pubkey(&key)?;
        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_cert_sign()
                .crl_sign()
                .build()?,
        )?;
        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(ski)?;
        builder.sign(&key, MessageDigest::sha256())?;

        let cert = builder.build();
        let cert_pem = String::from_utf8(cert.to_pem()?)?;
        info!(
            common_name = %subject.common_name,
            not_after = %window.not_after,
            "generated certificate authority"
        );
        Ok(Self {
            cert,
            key,
            cert_pem,
        })
    }

    /// Rebuild an authority from a stored certificate and private key.
    ///
    /// Only the first certificate in `cert_pem` is used.
    ///
    /// # Errors
    ///
    /// Returns [`CertAuthorityError::InvalidMaterial`] if either PEM cannot be
    /// parsed and [`CertAuthorityError::KeyMismatch`] if the key does not
    /// belong to the certificate.
    pub fn load(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, CertAuthorityError> {
        let cert = X509::from_pem(cert_pem)
            .map_err(|e| CertAuthorityError::InvalidMaterial(format!("certificate: {e}")))?;
        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| CertAuthorityError::InvalidMaterial(format!("private key: {e}")))?;
        if !cert.public_key()?.public_eq(&key) {
            return Err(CertAuthorityError::KeyMismatch);
        }
        let cert_pem = String::from_utf8(cert.to_pem()?)?;
        Ok(Self {
            cert,
            key,
            cert_pem,
        })
    }

    /// PEM of the root certificate, suitable as a trust bundle.
    #[must_use]
    pub fn ca_bundle_pem(&self) -> &str {
        &self.cert_pem
    }

    /// PEM of the root private key.
    ///
    /// # Errors
    ///
    /// Fails if the key cannot be serialized.
    pub fn private_key_pem(&self) -> Result<String, CertAuthorityError> {
        Ok(String::from_utf8(self.key.private_key_to_pem_pkcs8()?)?)
    }

    /// Common name of the root, if it has one.
    #[must_use]
    pub fn common_name(&self) -> Option<String> {
        self.cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|cn| cn.to_string())
    }

    /// Issue a leaf certificate signed by this authority.
    ///
    /// Each entry of `sans` that parses as an IP address becomes an IP SAN;
    /// the rest become DNS SANs. Extended key usages are `ServerAuth` and
    /// `ClientAuth` plus `extra_usages`.
    ///
    /// # Errors
    ///
    /// Fails if `validity` is zero or too large to represent, or if key
    /// generation or signing fails.
    pub fn issue(
        &self,
        subject: &Subject,
        sans: &[String],
        extra_usages: &[ExtendedKeyUsage],
        validity: Duration,
    ) -> Result<IssuedCertificate, CertAuthorityError> {
        let window = ValidityWindow::starting_now(validity)?;
        let key = generate_key()?;
        let issuer: &X509Ref = &self.cert;

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        builder.set_serial_number(&*random_serial()?)?;
        builder.set_subject_name(&*subject.to_x509_name()?)?;
        builder.set_issuer_name(issuer.subject_name())?;
        window.apply(&mut builder)?;
        builder.set_pubkey(&key)?;
        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        builder.append_extension(extended_key_usage_extension(extra_usages)?)?;

        if !sans.is_empty() {
            let mut alt_names = SubjectAlternativeName::new();
            for san in sans {
                if san.parse::<IpAddr>().is_ok() {
                    alt_names.ip(san);
                } else {
                    alt_names.dns(san);
                }
            }
            let extension = alt_names.build(&builder.x509v3_context(Some(issuer), None))?;
            builder.append_extension(extension)?;
        }

        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(issuer), None))?;
        builder.append_extension(aki)?;
        builder.sign(&self.key, MessageDigest::sha256())?;

        let cert = builder.build();
        debug!(
            common_name = %subject.common_name,
            organizations = subject.organizations.len(),
            sans = sans.len(),
            not_after = %window.not_after,
            "issued certificate"
        );
        Ok(IssuedCertificate {
            cert_pem: String::from_utf8(cert.to_pem()?)?,
            key_pem: String::from_utf8(key.private_key_to_pem_pkcs8()?)?,
            not_before: window.not_before,
            not_after: window.not_after,
        })
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("common_name", &self.common_name())
            .finish_non_exhaustive()
    }
}

struct ValidityWindow {
    not_before: OffsetDateTime,
    not_after: OffsetDateTime,
}

impl ValidityWindow {
    fn starting_now(validity: Duration) -> Result<Self, CertAuthorityError> {
        if validity.is_zero() {
            return Err(CertAuthorityError::InvalidValidity);
        }
        let validity =
            time::Duration::try_from(validity).map_err(|_| CertAuthorityError::InvalidValidity)?;
        // certificates carry whole seconds
        let now = OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp())?;
        let not_after = now
            .checked_add(validity)
            .ok_or(CertAuthorityError::InvalidValidity)?;
        let not_before = now
            .checked_sub(CLOCK_SKEW_BACKDATE)
            .ok_or(CertAuthorityError::InvalidValidity)?;
        Ok(Self {
            not_before,
            not_after,
        })
    }

    fn apply(&self, builder: &mut X509Builder) -> Result<(), ErrorStack> {
        builder.set_not_before(&*Asn1Time::from_unix(self.not_before.unix_timestamp())?)?;
        builder.set_not_after(&*Asn1Time::from_unix(self.not_after.unix_timestamp())?)?;
        Ok(())
    }
}

fn generate_key() -> Result<PKey<Private>, ErrorStack> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    PKey::from_ec_key(EcKey::generate(&group)?)
}

fn random_serial() -> Result<Asn1Integer, ErrorStack> {
    let mut serial = BigNum::new()?;
    serial.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)?;
    serial.to_asn1_integer()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn parse(pem: &str) -> X509 {
        X509::from_pem(pem.as_bytes()).unwrap()
    }

    fn entries(cert: &X509, nid: Nid) -> Vec<String> {
        cert.subject_name()
            .entries_by_nid(nid)
            .map(|e| e.data().as_utf8().unwrap().to_string())
            .collect()
    }

    fn text(cert: &X509) -> String {
        String::from_utf8(cert.to_text().unwrap()).unwrap()
    }

    #[test]
    fn new_rejects_zero_validity() {
        let err = CertificateAuthority::new(&Subject::new("root"), Duration::ZERO).unwrap_err();
        assert!(matches!(err, CertAuthorityError::InvalidValidity));
    }

    #[test]
    fn new_rejects_unrepresentable_validity() {
        let err = CertificateAuthority::new(&Subject::new("root"), Duration::MAX).unwrap_err();
        assert!(matches!(err, CertAuthorityError::InvalidValidity));
    }

    #[test]
    fn root_is_a_ca_with_the_requested_name() {
        let ca = CertificateAuthority::new(&Subject::new("impersonation proxy CA"), HOUR).unwrap();
        assert_eq!(ca.common_name().as_deref(), Some("impersonation proxy CA"));

        let root = parse(ca.ca_bundle_pem());
        assert!(text(&root).contains("CA:TRUE"));
        assert!(root.verify(&root.public_key().unwrap()).unwrap());
    }

    #[test]
    fn issue_puts_every_group_in_the_subject() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let subject = Subject::new("alice").with_organizations(["devs", "ops", "system:authenticated"]);

        let issued = ca.issue(&subject, &[], &[], HOUR).unwrap();
        let leaf = parse(&issued.cert_pem);

        assert_eq!(entries(&leaf, Nid::COMMONNAME), vec!["alice"]);
        assert_eq!(
            entries(&leaf, Nid::ORGANIZATIONNAME),
            vec!["devs", "ops", "system:authenticated"]
        );
        assert!(leaf.verify(&parse(ca.ca_bundle_pem()).public_key().unwrap()).unwrap());
    }

    #[test]
    fn issue_splits_ip_and_dns_sans() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let sans = vec![
            "impersonation-proxy".to_owned(),
            "10.0.0.7".to_owned(),
            "::1".to_owned(),
        ];

        let issued = ca.issue(&Subject::new("proxy"), &sans, &[], HOUR).unwrap();
        let leaf = parse(&issued.cert_pem);
        let names = leaf.subject_alt_names().unwrap();

        let dns: Vec<_> = names.iter().filter_map(|n| n.dnsname()).collect();
        let ips: Vec<_> = names.iter().filter_map(|n| n.ipaddress()).collect();
        assert_eq!(dns, vec!["impersonation-proxy"]);
        assert_eq!(ips.len(), 2);
        assert!(ips.contains(&[10u8, 0, 0, 7].as_slice()));
    }

    #[test]
    fn extended_key_usages_are_the_union_of_defaults_and_extras() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();

        let plain = parse(&ca.issue(&Subject::new("a"), &[], &[], HOUR).unwrap().cert_pem);
        let rendered = text(&plain);
        assert!(rendered.contains("TLS Web Server Authentication"));
        assert!(rendered.contains("TLS Web Client Authentication"));
        assert!(!rendered.contains("Code Signing"));

        let extra = [ExtendedKeyUsage::CodeSigning, ExtendedKeyUsage::ClientAuth];
        let extended = parse(&ca.issue(&Subject::new("b"), &[], &extra, HOUR).unwrap().cert_pem);
        let rendered = text(&extended);
        assert!(rendered.contains("Code Signing"));
        assert_eq!(rendered.matches("TLS Web Client Authentication").count(), 1);
    }

    #[test]
    fn validity_window_is_backdated_and_ends_after_ttl() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let before = OffsetDateTime::now_utc();
        let issued = ca.issue(&Subject::new("a"), &[], &[], Duration::from_secs(300)).unwrap();

        assert_eq!(issued.not_after - issued.not_before, time::Duration::minutes(10));
        assert!(issued.not_before <= before - time::Duration::minutes(4));
        assert!(issued.not_after >= before + time::Duration::minutes(4));

        let leaf = parse(&issued.cert_pem);
        let expected = Asn1Time::from_unix(issued.not_after.unix_timestamp()).unwrap();
        let diff = leaf.not_after().diff(&expected).unwrap();
        assert_eq!((diff.days, diff.secs), (0, 0));
    }

    #[test]
    fn serial_numbers_differ() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let a = parse(&ca.issue(&Subject::new("a"), &[], &[], HOUR).unwrap().cert_pem);
        let b = parse(&ca.issue(&Subject::new("a"), &[], &[], HOUR).unwrap().cert_pem);
        assert_ne!(
            a.serial_number().to_bn().unwrap(),
            b.serial_number().to_bn().unwrap()
        );
    }

    #[test]
    fn load_round_trips_and_rejects_mismatched_keys() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let key_pem = ca.private_key_pem().unwrap();

        let loaded = CertificateAuthority::load(ca.ca_bundle_pem().as_bytes(), key_pem.as_bytes())
            .unwrap();
        assert_eq!(loaded.ca_bundle_pem(), ca.ca_bundle_pem());

        let other = CertificateAuthority::new(&Subject::new("other"), HOUR).unwrap();
        let other_key = other.private_key_pem().unwrap();
        let err = CertificateAuthority::load(ca.ca_bundle_pem().as_bytes(), other_key.as_bytes())
            .unwrap_err();
        assert!(matches!(err, CertAuthorityError::KeyMismatch));

        let err = CertificateAuthority::load(b"garbage", key_pem.as_bytes()).unwrap_err();
        assert!(matches!(err, CertAuthorityError::InvalidMaterial(_)));
    }

    #[test]
    fn issue_rejects_zero_validity() {
        let ca = CertificateAuthority::new(&Subject::new("root"), HOUR).unwrap();
        let err = ca.issue(&Subject::new("a"), &[], &[], Duration::ZERO).unwrap_err();
        assert!(matches!(err, CertAuthorityError::InvalidValidity));
    }
}
