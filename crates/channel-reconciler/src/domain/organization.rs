//! Organization Mapper
//!
//! Turns raw identity material into the canonical organization record used by
//! the builder, the differ and the signing layer.
//!
//! ## NodeOU classification
//!
//! Every mapped organization enables NodeOUs. The client, peer, admin and
//! orderer roles are recognised by the organizational unit of certificates
//! issued by the signing root:
//!
//! ```text
//! signing root ──┬── OU=client
//!                ├── OU=peer
//!                ├── OU=admin
//!                └── OU=orderer
//! ```

use super::certificate::Certificate;
use super::policy::{organization_policies, PolicyMap};
use crate::error::ReconcileResult;
use serde::{Deserialize, Serialize};

pub const CLIENT_OU: &str = "client";
pub const PEER_OU: &str = "peer";
pub const ADMIN_OU: &str = "admin";
pub const ORDERER_OU: &str = "orderer";

/// Which side of the channel an organization sits on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrgRole {
    /// Application (peer) organization
    Peer,
    /// Ordering organization with its client-facing orderer endpoints
    Orderer { endpoints: Vec<String> },
}

/// Organizational unit bound to an issuing certificate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuIdentifier {
    pub certificate: Certificate,
    pub organizational_unit_identifier: String,
}

/// OU-based node classification rules
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOus {
    pub enable: bool,
    pub client_ou_identifier: OuIdentifier,
    pub peer_ou_identifier: OuIdentifier,
    pub admin_ou_identifier: OuIdentifier,
    pub orderer_ou_identifier: OuIdentifier,
}

impl NodeOus {
    /// All four roles recognised against `ca`
    pub fn enabled_for(ca: &Certificate) -> Self {
        let ou = |name: &str| OuIdentifier {
            certificate: ca.clone(),
            organizational_unit_identifier: name.to_string(),
        };
        Self {
            enable: true,
            client_ou_identifier: ou(CLIENT_OU),
            peer_ou_identifier: ou(PEER_OU),
            admin_ou_identifier: ou(ADMIN_OU),
            orderer_ou_identifier: ou(ORDERER_OU),
        }
    }
}

/// MSP definition of one organization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msp {
    pub name: String,
    pub root_certs: Vec<Certificate>,
    pub intermediate_certs: Vec<Certificate>,
    pub tls_root_certs: Vec<Certificate>,
    pub tls_intermediate_certs: Vec<Certificate>,
    pub admins: Vec<Certificate>,
    pub node_ous: NodeOus,
}

impl Msp {
    /// Whether `cert` was issued by one of this MSP's roots, directly or
    /// through one of its intermediates
    pub fn vouches_for(&self, cert: &Certificate) -> bool {
        self.root_certs.iter().any(|root| cert.is_issued_by(root))
            || self.intermediate_certs.iter().any(|intermediate| {
                cert.is_issued_by(intermediate)
                    && self.root_certs.iter().any(|root| intermediate.is_issued_by(root))
            })
    }
}

/// Canonical organization record.
///
/// Derived from the channel spec on every pass; never mutated, only replaced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
    pub msp: Msp,
    pub policies: PolicyMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub orderer_endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anchor_peers: Vec<String>,
}

impl OrganizationConfig {
    /// MSP identifier, unique within a channel
    pub fn msp_id(&self) -> &str {
        &self.name
    }

    pub fn signing_root(&self) -> Option<&Certificate> {
        self.msp.root_certs.first()
    }

    pub fn tls_root(&self) -> Option<&Certificate> {
        self.msp.tls_root_certs.first()
    }
}

/// Map PEM identity material into an [`OrganizationConfig`].
///
/// Fails with `CertificateParse` if either certificate is malformed.
pub fn map_organization(
    msp_id: &str,
    sign_root_pem: &str,
    tls_root_pem: &str,
    role: OrgRole,
) -> ReconcileResult<OrganizationConfig> {
    let ca_cert = Certificate::from_pem(sign_root_pem)?;
    let tls_ca_cert = Certificate::from_pem(tls_root_pem)?;
    Ok(map_parsed_organization(msp_id, ca_cert, tls_ca_cert, role))
}

/// Same as [`map_organization`] for already-parsed certificates
pub fn map_parsed_organization(
    msp_id: &str,
    ca_cert: Certificate,
    tls_ca_cert: Certificate,
    role: OrgRole,
) -> OrganizationConfig {
    let orderer_endpoints = match role {
        OrgRole::Peer => Vec::new(),
        OrgRole::Orderer { endpoints } => endpoints,
    };

    OrganizationConfig {
        name: msp_id.to_string(),
        msp: Msp {
            name: msp_id.to_string(),
            node_ous: NodeOus::enabled_for(&ca_cert),
            root_certs: vec![ca_cert],
            intermediate_certs: Vec::new(),
            tls_root_certs: vec![tls_ca_cert],
            tls_intermediate_certs: Vec::new(),
            admins: Vec::new(),
        },
        policies: organization_policies(msp_id),
        orderer_endpoints,
        anchor_peers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::ADMINS;
    use crate::error::ReconcileError;
    use crate::test_support::generate_ca;

    #[test]
    fn test_map_peer_organization() {
        let ca = generate_ca("org1-ca");
        let tls = generate_ca("org1-tlsca");

        let org = map_organization("Org1MSP", &ca.cert_pem, &tls.cert_pem, OrgRole::Peer).unwrap();

        assert_eq!(org.msp_id(), "Org1MSP");
        assert_eq!(org.signing_root().unwrap().subject_cn(), "org1-ca");
        assert_eq!(org.tls_root().unwrap().subject_cn(), "org1-tlsca");
        assert!(org.msp.node_ous.enable);
        assert_eq!(
            org.msp.node_ous.admin_ou_identifier.organizational_unit_identifier,
            ADMIN_OU
        );
        assert_eq!(
            &org.msp.node_ous.orderer_ou_identifier.certificate,
            org.signing_root().unwrap()
        );
        assert_eq!(org.policies[ADMINS].rule, "OR('Org1MSP.admin')");
        assert!(org.orderer_endpoints.is_empty());
    }

    #[test]
    fn test_map_orderer_organization_keeps_endpoints() {
        let ca = generate_ca("ord-ca");
        let tls = generate_ca("ord-tlsca");
        let role = OrgRole::Orderer {
            endpoints: vec!["orderer0.example.com:7050".to_string()],
        };

        let org = map_organization("OrdererMSP", &ca.cert_pem, &tls.cert_pem, role).unwrap();
        assert_eq!(org.orderer_endpoints, vec!["orderer0.example.com:7050"]);
    }

    #[test]
    fn test_bad_tls_root_fails() {
        let ca = generate_ca("org1-ca");
        let result = map_organization("Org1MSP", &ca.cert_pem, "-----BEGIN", OrgRole::Peer);
        assert!(matches!(result, Err(ReconcileError::CertificateParse { .. })));
    }
}
