//! Domain layer: channel configuration model and pure reconciliation logic

pub mod acl;
pub mod builder;
pub mod certificate;
pub mod channel;
pub mod diff;
pub mod envelope;
mod hex_bytes;
pub mod identity;
pub mod organization;
pub mod policy;
pub mod spec;

pub use acl::{default_acls, DEFAULT_ACLS};
pub use builder::{assemble_channel_config, build_channel_config, resolve_orderer_material};
pub use certificate::Certificate;
pub use channel::{
    ApplicationGroup, BatchSize, ChannelConfig, ConfigBlock, ConsenterConfig, EtcdRaft,
    EtcdRaftOptions, OrdererGroup, OrdererState, OrganizationMap,
};
pub use diff::{compute_update, diff_configs, ConfigUpdate, DiffOutcome};
pub use envelope::{SignaturePolicy, SignedEnvelope};
pub use identity::{ConfigSignature, SigningIdentity};
pub use organization::{map_organization, OrgRole, OrganizationConfig};
pub use policy::{AdminRule, Policy, PolicyMap, PolicyType};
pub use spec::ChannelSpec;
