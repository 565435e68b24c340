//! Channel configuration
//!
//! The complete configuration of an application channel, plus the block
//! wrapper the ordering service stores it in.

use super::certificate::Certificate;
use super::organization::OrganizationConfig;
use super::policy::PolicyMap;
use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const ETCDRAFT: &str = "etcdraft";
pub const CAPABILITY_V2_0: &str = "V2_0";

/// Full channel configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub orderer: OrdererGroup,
    pub application: ApplicationGroup,
    pub capabilities: Vec<String>,
    pub policies: PolicyMap,
}

impl ChannelConfig {
    pub fn application_org(&self, msp_id: &str) -> Option<&OrganizationConfig> {
        self.application.organizations.get(msp_id)
    }

    pub fn orderer_org(&self, msp_id: &str) -> Option<&OrganizationConfig> {
        self.orderer.organizations.get(msp_id)
    }

    pub fn application_msp_ids(&self) -> Vec<&str> {
        self.application
            .organizations
            .keys()
            .map(String::as_str)
            .collect()
    }

    /// Check that every organization is keyed by its own MSP id
    pub fn check_consistency(&self) -> ReconcileResult<()> {
        let groups = [
            ("Orderer", &self.orderer.organizations),
            ("Application", &self.application.organizations),
        ];
        for (group, organizations) in groups {
            for (key, org) in organizations {
                if key != org.msp_id() {
                    return Err(ReconcileError::DiffComputation {
                        reason: format!(
                            "{} organization keyed {} declares MSP id {}",
                            group,
                            key,
                            org.msp_id()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Canonical encoding carried in config blocks
    pub fn encode(&self) -> ReconcileResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ReconcileError::InvalidSpec {
            reason: format!("failed to encode channel config: {}", e),
        })
    }
}

/// Organizations of a group keyed by MSP id
pub type OrganizationMap = BTreeMap<String, OrganizationConfig>;

/// Ordering-service section of the channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdererGroup {
    pub orderer_type: String,
    #[serde(deserialize_with = "unique_organizations::deserialize")]
    pub organizations: OrganizationMap,
    pub etcd_raft: EtcdRaft,
    pub policies: PolicyMap,
    pub capabilities: Vec<String>,
    pub batch_size: BatchSize,
    #[serde(with = "duration_millis")]
    pub batch_timeout: Duration,
    pub state: OrdererState,
}

/// Application (peer) section of the channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationGroup {
    #[serde(deserialize_with = "unique_organizations::deserialize")]
    pub organizations: OrganizationMap,
    pub capabilities: Vec<String>,
    pub policies: PolicyMap,
    pub acls: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdererState {
    #[serde(rename = "STATE_NORMAL")]
    Normal,
    #[serde(rename = "STATE_MAINTENANCE")]
    Maintenance,
}

/// Raft consenter set and tuning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtcdRaft {
    pub consenters: Vec<ConsenterConfig>,
    pub options: EtcdRaftOptions,
}

/// One ordering node's address and TLS identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsenterConfig {
    pub host: String,
    pub port: u16,
    pub client_tls_cert: Certificate,
    pub server_tls_cert: Certificate,
}

impl ConsenterConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdRaftOptions {
    pub tick_interval: String,
    pub election_tick: u32,
    pub heartbeat_tick: u32,
    pub max_inflight_blocks: u32,
    pub snapshot_interval_size: u32,
}

impl Default for EtcdRaftOptions {
    fn default() -> Self {
        Self {
            tick_interval: "500ms".to_string(),
            election_tick: 10,
            heartbeat_tick: 1,
            max_inflight_blocks: 5,
            snapshot_interval_size: 16 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSize {
    pub max_message_count: u32,
    pub absolute_max_bytes: u32,
    pub preferred_max_bytes: u32,
}

impl Default for BatchSize {
    fn default() -> Self {
        Self {
            max_message_count: 100,
            absolute_max_bytes: 1024 * 1024,
            preferred_max_bytes: 512 * 1024,
        }
    }
}

pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration block as stored by the ordering service.
///
/// `data` is opaque to everything but [`ConfigBlock::decode_config`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBlock {
    pub channel_id: String,
    pub number: u64,
    /// Config sequence, incremented by every applied update
    pub sequence: u64,
    #[serde(with = "super::hex_bytes")]
    pub data: Vec<u8>,
}

impl ConfigBlock {
    /// Block 0 of a new channel
    pub fn genesis(channel_id: &str, config: &ChannelConfig) -> ReconcileResult<Self> {
        Ok(Self {
            channel_id: channel_id.to_string(),
            number: 0,
            sequence: 0,
            data: config.encode()?,
        })
    }

    /// Wire form submitted to orderer admin endpoints
    pub fn to_bytes(&self) -> ReconcileResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ReconcileError::InvalidSpec {
            reason: format!("failed to serialize block: {}", e),
        })
    }

    pub fn decode_config(&self) -> ReconcileResult<ChannelConfig> {
        let config: ChannelConfig =
            serde_json::from_slice(&self.data).map_err(|e| ReconcileError::DiffComputation {
                reason: format!(
                    "malformed config in block {} of channel {}: {}",
                    self.number, self.channel_id, e
                ),
            })?;
        config.check_consistency()?;
        Ok(config)
    }

    /// Structured rendering for the snapshot sink
    pub fn to_document(&self) -> ReconcileResult<serde_json::Value> {
        let config: serde_json::Value =
            serde_json::from_slice(&self.data).map_err(|e| ReconcileError::DiffComputation {
                reason: format!("error converting block to JSON: {}", e),
            })?;
        Ok(serde_json::json!({
            "channel_id": self.channel_id,
            "number": self.number,
            "sequence": self.sequence,
            "config": config,
        }))
    }
}

/// Organization maps reject duplicate MSP ids instead of keeping the last one
mod unique_organizations {
    use super::OrganizationMap;
    use crate::domain::organization::OrganizationConfig;
    use serde::de::{self, MapAccess, Visitor};
    use serde::Deserializer;
    use std::fmt;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OrganizationMap, D::Error> {
        struct OrganizationsVisitor;

        impl<'de> Visitor<'de> for OrganizationsVisitor {
            type Value = OrganizationMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of organizations keyed by MSP id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut organizations = OrganizationMap::new();
                while let Some((msp_id, org)) = map.next_entry::<String, OrganizationConfig>()? {
                    if organizations.contains_key(&msp_id) {
                        return Err(de::Error::custom(format!(
                            "duplicate organization {}",
                            msp_id
                        )));
                    }
                    organizations.insert(msp_id, org);
                }
                Ok(organizations)
            }
        }

        deserializer.deserialize_map(OrganizationsVisitor)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_operational_parameters() {
        let raft = EtcdRaftOptions::default();
        assert_eq!(raft.tick_interval, "500ms");
        assert_eq!(raft.election_tick, 10);
        assert_eq!(raft.heartbeat_tick, 1);
        assert_eq!(raft.max_inflight_blocks, 5);
        assert_eq!(raft.snapshot_interval_size, 16 * 1024 * 1024);

        let batch = BatchSize::default();
        assert_eq!(batch.max_message_count, 100);
        assert_eq!(batch.absolute_max_bytes, 1024 * 1024);
        assert_eq!(batch.preferred_max_bytes, 512 * 1024);
        assert_eq!(DEFAULT_BATCH_TIMEOUT, Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_block_is_diff_error() {
        let block = ConfigBlock {
            channel_id: "demo".to_string(),
            number: 3,
            sequence: 2,
            data: b"{not json".to_vec(),
        };
        assert!(matches!(
            block.decode_config(),
            Err(ReconcileError::DiffComputation { .. })
        ));
    }

    #[test]
    fn test_orderer_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrdererState::Normal).unwrap(),
            "\"STATE_NORMAL\""
        );
    }
}
