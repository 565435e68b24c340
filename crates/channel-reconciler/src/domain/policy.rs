//! Channel policies and admin rules

use crate::error::{ReconcileError, ReconcileResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Named policy table (`Readers`, `Writers`, `Admins`, ...)
pub type PolicyMap = BTreeMap<String, Policy>;

pub const READERS: &str = "Readers";
pub const WRITERS: &str = "Writers";
pub const ADMINS: &str = "Admins";
pub const ENDORSEMENT: &str = "Endorsement";
pub const LIFECYCLE_ENDORSEMENT: &str = "LifecycleEndorsement";
pub const BLOCK_VALIDATION: &str = "BlockValidation";

/// How a policy rule is evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyType {
    /// Aggregates the same-named policy of sub-groups (`ANY Readers`)
    ImplicitMeta,
    /// Signature expression over MSP principals (`OR('Org1MSP.admin')`)
    Signature,
}

/// A single policy entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub rule: String,
}

impl Policy {
    pub fn implicit_meta(rule: impl Into<String>) -> Self {
        Self {
            policy_type: PolicyType::ImplicitMeta,
            rule: rule.into(),
        }
    }

    pub fn signature(rule: impl Into<String>) -> Self {
        Self {
            policy_type: PolicyType::Signature,
            rule: rule.into(),
        }
    }
}

/// Admin quorum rule for an application or orderer group.
///
/// Rendered exactly as the ordering service expects it:
/// `OR('Org1MSP.admin','Org2MSP.admin')` or `MAJORITY Admins`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminRule {
    /// Any one admin of the listed organizations
    AnyOf(Vec<String>),
    /// A majority of the group's organization admins
    MajorityAdmins,
}

impl AdminRule {
    /// Rule for a declared admin organization list; empty means majority
    pub fn for_admin_orgs<S: AsRef<str>>(msp_ids: &[S]) -> Self {
        if msp_ids.is_empty() {
            Self::MajorityAdmins
        } else {
            Self::AnyOf(msp_ids.iter().map(|m| m.as_ref().to_string()).collect())
        }
    }

    /// Policy type the rule has to be stored under
    pub fn policy(&self) -> Policy {
        Policy::signature(self.to_string())
    }
}

impl fmt::Display for AdminRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MajorityAdmins => write!(f, "MAJORITY Admins"),
            Self::AnyOf(msp_ids) => {
                let principals: Vec<String> =
                    msp_ids.iter().map(|m| format!("'{}.admin'", m)).collect();
                write!(f, "OR({})", principals.join(","))
            }
        }
    }
}

impl FromStr for AdminRule {
    type Err = ReconcileError;

    fn from_str(rule: &str) -> ReconcileResult<Self> {
        let rule = rule.trim();
        if rule == "MAJORITY Admins" {
            return Ok(Self::MajorityAdmins);
        }

        let inner = rule
            .strip_prefix("OR(")
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| ReconcileError::InvalidSpec {
                reason: format!("unsupported admin rule: {}", rule),
            })?;

        let msp_ids = inner
            .split(',')
            .map(|principal| {
                principal
                    .trim()
                    .trim_matches('\'')
                    .strip_suffix(".admin")
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| ReconcileError::InvalidSpec {
                        reason: format!("unsupported admin principal: {}", principal),
                    })
            })
            .collect::<ReconcileResult<Vec<_>>>()?;

        Ok(Self::AnyOf(msp_ids))
    }
}

/// Policies every organization carries, keyed to its own MSP id
pub fn organization_policies(msp_id: &str) -> PolicyMap {
    let member = format!("OR('{}.member')", msp_id);
    let mut policies = PolicyMap::new();
    policies.insert(
        ADMINS.to_string(),
        Policy::signature(format!("OR('{}.admin')", msp_id)),
    );
    policies.insert(READERS.to_string(), Policy::signature(member.clone()));
    policies.insert(WRITERS.to_string(), Policy::signature(member.clone()));
    policies.insert(ENDORSEMENT.to_string(), Policy::signature(member));
    policies
}
