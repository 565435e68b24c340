//! Signed config update envelopes and admin quorum evaluation

use super::channel::{ChannelConfig, OrganizationMap};
use super::diff::ConfigUpdate;
use super::identity::ConfigSignature;
use super::organization::Msp;
use super::policy::{AdminRule, ADMINS};
use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Encoded config update plus the signatures collected over it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub channel_id: String,
    #[serde(with = "super::hex_bytes")]
    pub payload: Vec<u8>,
    pub signatures: Vec<ConfigSignature>,
}

impl SignedEnvelope {
    /// Envelope with no signatures yet
    pub fn unsigned(update: &ConfigUpdate) -> ReconcileResult<Self> {
        Ok(Self {
            channel_id: update.channel_id.clone(),
            payload: update.encode()?,
            signatures: Vec::new(),
        })
    }

    pub fn add_signature(&mut self, signature: ConfigSignature) {
        self.signatures.push(signature);
    }

    pub fn decode_update(&self) -> ReconcileResult<ConfigUpdate> {
        ConfigUpdate::decode(&self.payload)
    }

    /// Organizations with a valid signature over the payload, deduplicated.
    ///
    /// A signature only counts for the organization it names when `policy`
    /// trusts its certificate for that organization.
    pub fn valid_signers(&self, policy: &SignaturePolicy) -> BTreeSet<&str> {
        self.signatures
            .iter()
            .filter(|s| policy.admits(s) && s.verify(&self.payload))
            .map(ConfigSignature::signer)
            .collect()
    }

    /// Check that the valid signatures satisfy `policy`
    pub fn check_quorum(&self, policy: &SignaturePolicy) -> ReconcileResult<()> {
        let signers = self.valid_signers(policy);
        let (present, missing): (Vec<&String>, Vec<&String>) = policy
            .candidates
            .iter()
            .partition(|msp_id| signers.contains(msp_id.as_str()));

        if present.len() >= policy.threshold {
            Ok(())
        } else {
            Err(ReconcileError::InsufficientSignatures {
                have: present.len(),
                need: policy.threshold,
                missing: missing.into_iter().cloned().collect(),
            })
        }
    }

    pub fn to_bytes(&self) -> ReconcileResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ReconcileError::DiffComputation {
            reason: format!("failed to encode envelope: {}", e),
        })
    }
}

/// Who has to sign, how many of them, and which MSP vouches for each signer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignaturePolicy {
    candidates: Vec<String>,
    threshold: usize,
    trust: BTreeMap<String, Msp>,
}

impl SignaturePolicy {
    /// `OR(...)` requires every listed org; `MAJORITY` needs ⌊n/2⌋+1 of `organizations`.
    ///
    /// Candidates missing from `organizations` can never be satisfied.
    pub fn from_rule(rule: &AdminRule, organizations: &OrganizationMap) -> Self {
        let candidates: Vec<String> = match rule {
            AdminRule::AnyOf(msp_ids) => msp_ids.clone(),
            AdminRule::MajorityAdmins => organizations.keys().cloned().collect(),
        };
        let threshold = match rule {
            AdminRule::AnyOf(_) => candidates.len(),
            AdminRule::MajorityAdmins => candidates.len() / 2 + 1,
        };
        let trust = candidates
            .iter()
            .filter_map(|msp_id| {
                organizations
                    .get(msp_id)
                    .map(|org| (msp_id.clone(), org.msp.clone()))
            })
            .collect();

        Self {
            candidates,
            threshold,
            trust,
        }
    }

    /// Policy governed by the application `Admins` entry of `config`
    pub fn from_config(config: &ChannelConfig) -> ReconcileResult<Self> {
        let admins = config.application.policies.get(ADMINS).ok_or_else(|| {
            ReconcileError::DiffComputation {
                reason: "application group has no Admins policy".to_string(),
            }
        })?;
        let rule: AdminRule = admins.rule.parse()?;
        Ok(Self::from_rule(&rule, &config.application.organizations))
    }

    /// Whether the certificate behind `signature` was issued by the MSP of
    /// the organization it claims
    pub fn admits(&self, signature: &ConfigSignature) -> bool {
        let Some(msp) = self.trust.get(signature.signer()) else {
            return false;
        };
        signature
            .certificate()
            .map(|cert| msp.vouches_for(&cert))
            .unwrap_or(false)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
