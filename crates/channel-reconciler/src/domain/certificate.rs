//! PEM-encoded X.509 certificates
//!
//! Certificates are validated once on construction and afterwards carried as
//! their PEM text (the form channel configs are exchanged in) plus DER bytes.

use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use x509_parser::prelude::*;

/// A well-formed X.509 certificate
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Certificate {
    pem: String,
    der: Vec<u8>,
    subject_cn: String,
}

impl Certificate {
    /// Parse a PEM block. Only the first `CERTIFICATE` block is used.
    pub fn from_pem(pem: &str) -> ReconcileResult<Self> {
        let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).map_err(|e| {
            ReconcileError::CertificateParse {
                context: "pem".to_string(),
                reason: e.to_string(),
            }
        })?;

        if block.label != "CERTIFICATE" {
            return Err(ReconcileError::CertificateParse {
                context: "pem".to_string(),
                reason: format!("unexpected PEM label {}", block.label),
            });
        }

        let subject_cn = {
            let (_, cert) = X509Certificate::from_der(&block.contents).map_err(|e| {
                ReconcileError::CertificateParse {
                    context: "x509".to_string(),
                    reason: e.to_string(),
                }
            })?;
            let cn = cert
                .subject()
                .iter_common_name()
                .next()
                .and_then(|attr| attr.as_str().ok())
                .unwrap_or_default()
                .to_string();
            cn
        };

        Ok(Self {
            pem: pem.trim().to_string(),
            der: block.contents,
            subject_cn,
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject_cn(&self) -> &str {
        &self.subject_cn
    }

    /// SEC1-encoded subject public key
    pub fn public_key_bytes(&self) -> ReconcileResult<Vec<u8>> {
        let (_, cert) =
            X509Certificate::from_der(&self.der).map_err(|e| ReconcileError::CertificateParse {
                context: "x509".to_string(),
                reason: e.to_string(),
            })?;
        let key: &[u8] = &cert.public_key().subject_public_key.data;
        Ok(key.to_vec())
    }

    /// Whether `issuer` is named as this certificate's issuer and its key
    /// verifies this certificate's signature
    pub fn is_issued_by(&self, issuer: &Certificate) -> bool {
        let (Ok((_, cert)), Ok((_, issuer))) = (
            X509Certificate::from_der(&self.der),
            X509Certificate::from_der(&issuer.der),
        ) else {
            return false;
        };
        cert.issuer().as_raw() == issuer.subject().as_raw()
            && cert.verify_signature(Some(issuer.public_key())).is_ok()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject_cn", &self.subject_cn)
            .field("der_len", &self.der.len())
            .finish()
    }
}

impl TryFrom<String> for Certificate {
    type Error = ReconcileError;

    fn try_from(pem: String) -> Result<Self, Self::Error> {
        Self::from_pem(&pem)
    }
}

impl From<Certificate> for String {
    fn from(cert: Certificate) -> Self {
        cert.pem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generate_ca;

    #[test]
    fn test_issued_by_checks_the_issuer_key() {
        let ca = generate_ca("org1-ca");
        let other = generate_ca("org2-ca");
        let root = Certificate::from_pem(&ca.cert_pem).unwrap();
        let other_root = Certificate::from_pem(&other.cert_pem).unwrap();
        let admin = Certificate::from_pem(&ca.issue("org1-admin").cert_pem).unwrap();

        assert!(admin.is_issued_by(&root));
        assert!(!admin.is_issued_by(&other_root));
        assert!(root.is_issued_by(&root));
        assert!(!other_root.is_issued_by(&root));
    }

    #[test]
    fn test_parses_generated_certificate() {
        let ca = generate_ca("org1-ca");
        let cert = Certificate::from_pem(&ca.cert_pem).unwrap();
        assert_eq!(cert.subject_cn(), "org1-ca");
        assert!(!cert.der().is_empty());
        // uncompressed P-256 point
        assert_eq!(cert.public_key_bytes().unwrap().len(), 65);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = Certificate::from_pem("not a certificate");
        assert!(matches!(
            result,
            Err(ReconcileError::CertificateParse { .. })
        ));
    }

    #[test]
    fn test_rejects_private_key_block() {
        let ca = generate_ca("org1-ca");
        let result = Certificate::from_pem(&ca.key_pem);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_as_pem_string() {
        let ca = generate_ca("org1-ca");
        let cert = Certificate::from_pem(&ca.cert_pem).unwrap();
        let json = serde_json::to_string(&cert).unwrap();
        assert!(json.contains("BEGIN CERTIFICATE"));
        let back: Certificate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cert);
    }
}
