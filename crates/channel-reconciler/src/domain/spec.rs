//! Declarative channel description
//!
//! The desired state delivered by the watch layer. Field names follow the
//! camelCase document format the resource is authored in.

use super::channel::{BatchSize, EtcdRaftOptions};
use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Desired state of one application channel
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSpec {
    pub name: String,
    #[serde(default)]
    pub peer_organizations: Vec<PeerOrganizationSpec>,
    #[serde(default)]
    pub external_peer_organizations: Vec<ExternalOrganizationSpec>,
    #[serde(default)]
    pub orderer_organizations: Vec<OrdererOrganizationSpec>,
    #[serde(default)]
    pub external_orderer_organizations: Vec<ExternalOrdererOrganizationSpec>,
    #[serde(default)]
    pub consenters: Vec<ConsenterSpec>,
    #[serde(default)]
    pub admin_peer_organizations: Vec<MspRef>,
    #[serde(default)]
    pub admin_orderer_organizations: Vec<MspRef>,
    #[serde(default)]
    pub channel_config: Option<ChannelConfigOverrides>,
}

/// Peer organization whose certificate authority is managed in-cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerOrganizationSpec {
    #[serde(rename = "mspID")]
    pub msp_id: String,
    pub ca_name: String,
    pub ca_namespace: String,
}

/// Organization known only through its published root certificates
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalOrganizationSpec {
    #[serde(rename = "mspID")]
    pub msp_id: String,
    pub tls_root_cert: String,
    pub sign_root_cert: String,
}

/// Ordering organization, either CA-backed or with inline certificates
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdererOrganizationSpec {
    #[serde(rename = "mspID")]
    pub msp_id: String,
    #[serde(default)]
    pub ca_name: String,
    #[serde(default)]
    pub ca_namespace: String,
    #[serde(default, rename = "tlsCACert")]
    pub tls_ca_cert: String,
    #[serde(default, rename = "signCACert")]
    pub sign_ca_cert: String,
    #[serde(default)]
    pub orderer_endpoints: Vec<String>,
    #[serde(default)]
    pub orderers_to_join: Vec<OrdererNodeRef>,
    #[serde(default)]
    pub external_orderers_to_join: Vec<ExternalOrdererNode>,
}

impl OrdererOrganizationSpec {
    /// Where this organization's certificates come from
    pub fn certificate_source(&self) -> ReconcileResult<CertificateSource<'_>> {
        if !self.ca_name.is_empty() && !self.ca_namespace.is_empty() {
            Ok(CertificateSource::Authority {
                name: &self.ca_name,
                namespace: &self.ca_namespace,
            })
        } else if !self.tls_ca_cert.is_empty() && !self.sign_ca_cert.is_empty() {
            Ok(CertificateSource::Inline {
                sign_root_pem: &self.sign_ca_cert,
                tls_root_pem: &self.tls_ca_cert,
            })
        } else {
            Err(ReconcileError::OrganizationResolution {
                msp_id: self.msp_id.clone(),
                reason: "neither a certificate authority nor inline certificates are declared"
                    .to_string(),
            })
        }
    }
}

/// Resolved origin of an organization's root certificates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateSource<'a> {
    Authority { name: &'a str, namespace: &'a str },
    Inline { sign_root_pem: &'a str, tls_root_pem: &'a str },
}

/// Ordering organization outside the cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalOrdererOrganizationSpec {
    #[serde(rename = "mspID")]
    pub msp_id: String,
    pub tls_root_cert: String,
    pub sign_root_cert: String,
    #[serde(default)]
    pub orderer_endpoints: Vec<String>,
}

/// Cluster-managed ordering node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdererNodeRef {
    pub name: String,
    pub namespace: String,
}

/// Ordering node reachable at a fixed admin address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalOrdererNode {
    pub host: String,
    pub admin_port: u16,
}

/// Consenter as declared in a `ChannelSpec`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsenterSpec {
    pub host: String,
    pub port: u16,
    pub tls_cert: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MspRef {
    #[serde(rename = "mspID")]
    pub msp_id: String,
}

impl From<&str> for MspRef {
    fn from(msp_id: &str) -> Self {
        Self {
            msp_id: msp_id.to_string(),
        }
    }
}

/// Optional overrides of channel operational parameters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfigOverrides {
    #[serde(default)]
    pub orderer: Option<OrdererOverrides>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdererOverrides {
    /// Go-style duration string, e.g. `2s` or `500ms`
    #[serde(default)]
    pub batch_timeout: Option<String>,
    #[serde(default)]
    pub batch_size: Option<BatchSize>,
    #[serde(default)]
    pub etcd_raft: Option<EtcdRaftSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EtcdRaftSpec {
    #[serde(default)]
    pub options: Option<EtcdRaftOptions>,
}

impl ChannelSpec {
    pub fn from_json(document: &str) -> ReconcileResult<Self> {
        serde_json::from_str(document).map_err(|e| ReconcileError::InvalidSpec {
            reason: e.to_string(),
        })
    }

    pub fn from_yaml(document: &str) -> ReconcileResult<Self> {
        serde_yaml::from_str(document).map_err(|e| ReconcileError::InvalidSpec {
            reason: e.to_string(),
        })
    }

    /// Structural checks that do not need any collaborator
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.name.trim().is_empty() {
            return Err(ReconcileError::InvalidSpec {
                reason: "channel name is empty".to_string(),
            });
        }
        if self.orderer_organizations.is_empty() && self.external_orderer_organizations.is_empty()
        {
            return Err(ReconcileError::InvalidSpec {
                reason: format!("channel {} declares no ordering organization", self.name),
            });
        }
        Ok(())
    }

    pub fn admin_peer_msp_ids(&self) -> Vec<&str> {
        self.admin_peer_organizations
            .iter()
            .map(|r| r.msp_id.as_str())
            .collect()
    }

    pub fn admin_orderer_msp_ids(&self) -> Vec<&str> {
        self.admin_orderer_organizations
            .iter()
            .map(|r| r.msp_id.as_str())
            .collect()
    }

    pub fn orderer_overrides(&self) -> Option<&OrdererOverrides> {
        self.channel_config.as_ref()?.orderer.as_ref()
    }
}

/// Parse a Go-style duration (`2s`, `500ms`, `1m30s`, `1.5h`)
pub fn parse_duration(input: &str) -> ReconcileResult<Duration> {
    let invalid = || ReconcileError::InvalidSpec {
        reason: format!("invalid duration: {:?}", input),
    };

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total_nanos += value * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("2").is_err());
        assert!(parse_duration("two seconds").is_err());
        assert!(parse_duration("5d").is_err());
    }

    #[test]
    fn test_spec_from_json_document() {
        let spec = ChannelSpec::from_json(
            r#"{
                "name": "demo",
                "peerOrganizations": [{"mspID": "Org1MSP", "caName": "org1-ca", "caNamespace": "default"}],
                "ordererOrganizations": [{
                    "mspID": "OrdererMSP",
                    "caName": "ord-ca",
                    "caNamespace": "default",
                    "ordererEndpoints": ["orderer0:7050"],
                    "externalOrderersToJoin": [{"host": "orderer0", "adminPort": 7053}]
                }],
                "adminPeerOrganizations": [{"mspID": "Org1MSP"}],
                "channelConfig": {"orderer": {"batchTimeout": "3s"}}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.name, "demo");
        assert_eq!(spec.peer_organizations[0].msp_id, "Org1MSP");
        assert_eq!(spec.admin_peer_msp_ids(), vec!["Org1MSP"]);
        assert_eq!(
            spec.orderer_organizations[0].external_orderers_to_join[0].admin_port,
            7053
        );
        assert_eq!(
            spec.orderer_overrides().unwrap().batch_timeout.as_deref(),
            Some("3s")
        );
        spec.validate().unwrap();
    }

    #[test]
    fn test_validate_requires_orderer_org() {
        let spec = ChannelSpec {
            name: "demo".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            spec.validate(),
            Err(ReconcileError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_orderer_org_without_certificates_is_unresolvable() {
        let org = OrdererOrganizationSpec {
            msp_id: "OrdererMSP".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            org.certificate_source(),
            Err(ReconcileError::OrganizationResolution { .. })
        ));
    }
}
