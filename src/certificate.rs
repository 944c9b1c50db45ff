//! X.509 subject decoding for keychain certificates and the developer
//! certificates embedded in provisioning profiles.

use crate::error::{Result, ResignError};
use x509_certificate::rfc3280::AttributeTypeAndValue;
use x509_certificate::X509Certificate;

/// The fields of a certificate subject the resolver cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateSubject {
    pub common_name: Option<String>,
    pub organizational_unit: Option<String>,
    pub organization: Option<String>,
    pub country: Option<String>,
}

impl CertificateSubject {
    pub fn from_der(data: &[u8]) -> Result<Self> {
        let cert = X509Certificate::from_der(data)
            .map_err(|e| ResignError::Certificate(format!("failed to parse DER certificate: {}", e)))?;
        Self::from_certificate(&cert)
    }

    /// Subject of the first certificate in PEM text (`security find-certificate -p` output).
    pub fn from_pem(data: &[u8]) -> Result<Self> {
        let certs = X509Certificate::from_pem_multiple(data)
            .map_err(|e| ResignError::Certificate(format!("failed to parse PEM certificate: {}", e)))?;
        let cert = certs
            .first()
            .ok_or_else(|| ResignError::Certificate("no certificate in PEM data".to_string()))?;
        Self::from_certificate(cert)
    }

    fn from_certificate(cert: &X509Certificate) -> Result<Self> {
        let name = cert.subject_name();
        Ok(Self {
            common_name: first_value(name.iter_common_name())?,
            organizational_unit: first_value(name.iter_organizational_unit())?,
            organization: first_value(name.iter_organization())?,
            country: first_value(name.iter_country())?,
        })
    }

    /// OpenSSL-style one line subject, `/CN=.../OU=.../O=.../C=.../`.
    pub fn one_line(&self) -> String {
        let mut line = String::from("/");
        for (key, value) in [
            ("CN", &self.common_name),
            ("OU", &self.organizational_unit),
            ("O", &self.organization),
            ("C", &self.country),
        ] {
            if let Some(value) = value {
                line.push_str(&format!("{}={}/", key, value));
            }
        }
        line
    }
}

fn first_value<'a>(
    mut values: impl Iterator<Item = &'a AttributeTypeAndValue>,
) -> Result<Option<String>> {
    values
        .next()
        .map(|atv| {
            atv.to_string()
                .map_err(|e| ResignError::Certificate(format!("bad subject attribute: {}", e)))
        })
        .transpose()
}

/// Whether a one line subject names `identity` within `team_id`, ignoring case.
pub fn subject_names_identity(subject: &str, identity: &str, team_id: &str) -> bool {
    let needle = format!("/CN={}/OU={}/", identity, team_id).to_lowercase();
    subject.to_lowercase().contains(&needle)
}
