//! Config Differ
//!
//! Computes the minimal [`ConfigUpdate`] that moves the live channel
//! configuration to the target on the reconciled surface:
//!
//! - application organization membership (by MSP id)
//! - application policies (replaced wholesale)
//! - ACLs (replaced wholesale)
//!
//! Organizations present on both sides are left untouched, even if their
//! definition drifted. Everything outside the surface is carried over from the
//! current configuration when the update is applied.

use super::channel::{ChannelConfig, ConfigBlock};
use super::organization::OrganizationConfig;
use super::policy::PolicyMap;
use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Delta between the current and target configuration of a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub channel_id: String,
    /// Sequence of the configuration the update was computed against
    pub base_sequence: u64,
    /// Application organizations to add, ordered by MSP id
    pub add_organizations: Vec<OrganizationConfig>,
    /// MSP ids of application organizations to remove
    pub remove_organizations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_policies: Option<PolicyMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acls: Option<BTreeMap<String, String>>,
}

/// Result of diffing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Current already matches the target
    NoChange,
    Update(ConfigUpdate),
}

impl DiffOutcome {
    pub fn is_no_change(&self) -> bool {
        matches!(self, Self::NoChange)
    }
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.add_organizations.is_empty()
            && self.remove_organizations.is_empty()
            && self.application_policies.is_none()
            && self.acls.is_none()
    }

    /// Apply the update to `current`, producing the next configuration
    pub fn apply_to(&self, current: &ChannelConfig) -> ChannelConfig {
        let mut next = current.clone();
        let application = &mut next.application;

        for msp_id in &self.remove_organizations {
            application.organizations.remove(msp_id);
        }
        for org in &self.add_organizations {
            application
                .organizations
                .insert(org.msp_id().to_string(), org.clone());
        }
        if let Some(policies) = &self.application_policies {
            application.policies = policies.clone();
        }
        if let Some(acls) = &self.acls {
            application.acls = acls.clone();
        }

        next
    }

    /// Canonical payload bytes, the input to every signature
    pub fn encode(&self) -> ReconcileResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ReconcileError::DiffComputation {
            reason: format!("failed to encode config update: {}", e),
        })
    }

    pub fn decode(bytes: &[u8]) -> ReconcileResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ReconcileError::DiffComputation {
            reason: format!("malformed config update: {}", e),
        })
    }
}

/// Decode the live config block and diff it against `target`
pub fn compute_update(current: &ConfigBlock, target: &ChannelConfig) -> ReconcileResult<DiffOutcome> {
    let current_config = current.decode_config()?;
    target.check_consistency()?;
    Ok(diff_configs(
        &current.channel_id,
        current.sequence,
        &current_config,
        target,
    ))
}

/// Diff two decoded configurations
pub fn diff_configs(
    channel_id: &str,
    base_sequence: u64,
    current: &ChannelConfig,
    target: &ChannelConfig,
) -> DiffOutcome {
    let current_orgs = &current.application.organizations;
    let target_orgs = &target.application.organizations;

    let remove_organizations: Vec<String> = current_orgs
        .keys()
        .filter(|msp_id| !target_orgs.contains_key(*msp_id))
        .cloned()
        .collect();
    let add_organizations: Vec<OrganizationConfig> = target_orgs
        .iter()
        .filter(|(msp_id, _)| !current_orgs.contains_key(*msp_id))
        .map(|(_, org)| org.clone())
        .collect();

    let application_policies = (current.application.policies != target.application.policies)
        .then(|| target.application.policies.clone());
    let acls = (current.application.acls != target.application.acls)
        .then(|| target.application.acls.clone());

    let update = ConfigUpdate {
        channel_id: channel_id.to_string(),
        base_sequence,
        add_organizations,
        remove_organizations,
        application_policies,
        acls,
    };

    if update.is_empty() {
        DiffOutcome::NoChange
    } else {
        DiffOutcome::Update(update)
    }
}
