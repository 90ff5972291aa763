//! Certificate subjects and usages.

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::x509::X509Name;
use openssl::x509::extension::ExtendedKeyUsage as EkuBuilder;
use openssl::x509::X509Extension;

/// Subject distinguished name: one common name and any number of
/// organizations. Client certificates carry the user's groups as
/// organizations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subject {
    pub common_name: String,
    pub organizations: Vec<String>,
}

impl Subject {
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organizations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_organizations<I, S>(mut self, organizations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organizations.extend(organizations.into_iter().map(Into::into));
        self
    }

    pub(crate) fn to_x509_name(&self) -> Result<X509Name, ErrorStack> {
        let mut name = X509Name::builder()?;
        name.append_entry_by_nid(Nid::COMMONNAME, &self.common_name)?;
        for organization in &self.organizations {
            name.append_entry_by_nid(Nid::ORGANIZATIONNAME, organization)?;
        }
        Ok(name.build())
    }
}

/// Extended key usages that may be requested on top of the defaults
/// (`ServerAuth` and `ClientAuth` are always present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    TimeStamping,
}

pub(crate) fn extended_key_usage_extension(
    extra: &[ExtendedKeyUsage],
) -> Result<X509Extension, ErrorStack> {
    let mut usages = vec![ExtendedKeyUsage::ServerAuth, ExtendedKeyUsage::ClientAuth];
    usages.extend_from_slice(extra);
    usages.sort_unstable();
    usages.dedup();

    let mut builder = EkuBuilder::new();
    for usage in usages {
        match usage {
            ExtendedKeyUsage::ServerAuth => builder.server_auth(),
            ExtendedKeyUsage::ClientAuth => builder.client_auth(),
            ExtendedKeyUsage::CodeSigning => builder.code_signing(),
            ExtendedKeyUsage::EmailProtection => builder.email_protection(),
            ExtendedKeyUsage::TimeStamping => builder.time_stamping(),
        };
    }
    builder.build()
}
