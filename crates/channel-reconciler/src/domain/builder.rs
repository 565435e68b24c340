//! Channel Config Builder
//!
//! Resolves every organization named by a [`ChannelSpec`] and assembles the
//! complete target [`ChannelConfig`].
//!
//! ## Groups
//!
//! | Group | Organizations | Admins |
//! |-------|---------------|--------|
//! | Orderer | cluster-managed, then external ordering orgs | rule over admin orderer orgs |
//! | Application | cluster-managed, then external peer orgs | rule over admin peer orgs |
//! | Channel | - | `MAJORITY Admins` |
//!
//! Resolution is the only async step. Assembly is pure so that tests and the
//! genesis path share one code path.

use super::acl::default_acls;
use super::certificate::Certificate;
use super::channel::{
    ApplicationGroup, BatchSize, ChannelConfig, ConsenterConfig, EtcdRaft, EtcdRaftOptions,
    OrdererGroup, OrdererState, OrganizationMap, CAPABILITY_V2_0, DEFAULT_BATCH_TIMEOUT, ETCDRAFT,
};
use super::organization::{map_organization, OrgRole, OrganizationConfig};
use super::policy::{
    AdminRule, Policy, PolicyMap, ADMINS, BLOCK_VALIDATION, ENDORSEMENT, LIFECYCLE_ENDORSEMENT,
    READERS, WRITERS,
};
use super::spec::{parse_duration, CertificateSource, ChannelSpec, OrdererOrganizationSpec};
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{CaMaterial, OrganizationDirectory};
use tracing::debug;

/// Resolve all organizations of `spec` and build the target configuration
pub async fn build_channel_config(
    spec: &ChannelSpec,
    directory: &dyn OrganizationDirectory,
) -> ReconcileResult<ChannelConfig> {
    spec.validate()?;

    let mut peer_orgs = Vec::new();
    for org in &spec.peer_organizations {
        let material = directory
            .certificate_authority(&org.ca_name, &org.ca_namespace)
            .await
            .map_err(|e| resolution_error(&org.msp_id, e))?;
        peer_orgs.push(map_organization(
            &org.msp_id,
            &material.sign_root_pem,
            &material.tls_root_pem,
            OrgRole::Peer,
        )?);
    }
    for org in &spec.external_peer_organizations {
        peer_orgs.push(map_organization(
            &org.msp_id,
            &org.sign_root_cert,
            &org.tls_root_cert,
            OrgRole::Peer,
        )?);
    }

    let mut orderer_orgs = Vec::new();
    for org in &spec.orderer_organizations {
        let material = resolve_orderer_material(org, directory).await?;
        orderer_orgs.push(map_organization(
            &org.msp_id,
            &material.sign_root_pem,
            &material.tls_root_pem,
            OrgRole::Orderer {
                endpoints: org.orderer_endpoints.clone(),
            },
        )?);
    }
    for org in &spec.external_orderer_organizations {
        orderer_orgs.push(map_organization(
            &org.msp_id,
            &org.sign_root_cert,
            &org.tls_root_cert,
            OrgRole::Orderer {
                endpoints: org.orderer_endpoints.clone(),
            },
        )?);
    }

    debug!(
        channel = %spec.name,
        peer_orgs = peer_orgs.len(),
        orderer_orgs = orderer_orgs.len(),
        "Resolved channel organizations"
    );

    assemble_channel_config(spec, peer_orgs, orderer_orgs)
}

/// Root certificates of an ordering organization, from its CA or inline
pub async fn resolve_orderer_material(
    org: &OrdererOrganizationSpec,
    directory: &dyn OrganizationDirectory,
) -> ReconcileResult<CaMaterial> {
    match org.certificate_source()? {
        CertificateSource::Authority { name, namespace } => directory
            .certificate_authority(name, namespace)
            .await
            .map_err(|e| resolution_error(&org.msp_id, e)),
        CertificateSource::Inline {
            sign_root_pem,
            tls_root_pem,
        } => Ok(CaMaterial {
            sign_root_pem: sign_root_pem.to_string(),
            tls_root_pem: tls_root_pem.to_string(),
        }),
    }
}

/// Assemble the target configuration from already-mapped organizations
pub fn assemble_channel_config(
    spec: &ChannelSpec,
    peer_orgs: Vec<OrganizationConfig>,
    orderer_orgs: Vec<OrganizationConfig>,
) -> ReconcileResult<ChannelConfig> {
    let consenters = spec
        .consenters
        .iter()
        .map(|c| {
            let tls_cert = Certificate::from_pem(&c.tls_cert).map_err(|e| {
                ReconcileError::CertificateParse {
                    context: format!("consenter {}:{}", c.host, c.port),
                    reason: e.to_string(),
                }
            })?;
            Ok(ConsenterConfig {
                host: c.host.clone(),
                port: c.port,
                client_tls_cert: tls_cert.clone(),
                server_tls_cert: tls_cert,
            })
        })
        .collect::<ReconcileResult<Vec<_>>>()?;

    let overrides = spec.orderer_overrides();

    let batch_timeout = match overrides.and_then(|o| o.batch_timeout.as_deref()) {
        Some(raw) if !raw.is_empty() => parse_duration(raw)?,
        _ => DEFAULT_BATCH_TIMEOUT,
    };
    let batch_size = overrides
        .and_then(|o| o.batch_size)
        .unwrap_or_default();
    let raft_options = overrides
        .and_then(|o| o.etcd_raft.as_ref())
        .and_then(|r| r.options.clone())
        .unwrap_or_default();

    let channel_capabilities = spec
        .channel_config
        .as_ref()
        .and_then(|c| c.capabilities.clone())
        .unwrap_or_else(|| vec![CAPABILITY_V2_0.to_string()]);

    let orderer_orgs = organization_map(orderer_orgs)?;
    let peer_orgs = organization_map(peer_orgs)?;
    let orderer_admins = admin_rule(&orderer_orgs, &spec.admin_orderer_msp_ids(), "orderer")?;
    let peer_admins = admin_rule(&peer_orgs, &spec.admin_peer_msp_ids(), "application")?;

    Ok(ChannelConfig {
        orderer: orderer_group(
            orderer_orgs,
            consenters,
            raft_options,
            batch_size,
            batch_timeout,
            orderer_admins,
        ),
        application: application_group(peer_orgs, peer_admins),
        capabilities: channel_capabilities,
        policies: channel_policies(),
    })
}

fn orderer_group(
    organizations: OrganizationMap,
    consenters: Vec<ConsenterConfig>,
    options: EtcdRaftOptions,
    batch_size: BatchSize,
    batch_timeout: std::time::Duration,
    admins: AdminRule,
) -> OrdererGroup {
    let mut policies = meta_policies();
    policies.insert(ADMINS.to_string(), admins.policy());
    policies.insert(
        BLOCK_VALIDATION.to_string(),
        Policy::implicit_meta("ANY Writers"),
    );

    OrdererGroup {
        orderer_type: ETCDRAFT.to_string(),
        organizations,
        etcd_raft: EtcdRaft {
            consenters,
            options,
        },
        policies,
        capabilities: vec![CAPABILITY_V2_0.to_string()],
        batch_size,
        batch_timeout,
        state: OrdererState::Normal,
    }
}

/// Application group for the given organizations and admin rule
pub fn application_group(organizations: OrganizationMap, admins: AdminRule) -> ApplicationGroup {
    ApplicationGroup {
        organizations,
        capabilities: vec![CAPABILITY_V2_0.to_string()],
        policies: application_policies(admins),
        acls: default_acls(),
    }
}

/// Application policies: meta Readers/Writers, Admins rule, endorsement majority
pub fn application_policies(admins: AdminRule) -> PolicyMap {
    let mut policies = meta_policies();
    policies.insert(ADMINS.to_string(), admins.policy());
    policies.insert(
        ENDORSEMENT.to_string(),
        Policy::implicit_meta("MAJORITY Endorsement"),
    );
    policies.insert(
        LIFECYCLE_ENDORSEMENT.to_string(),
        Policy::implicit_meta("MAJORITY Endorsement"),
    );
    policies
}

fn channel_policies() -> PolicyMap {
    let mut policies = meta_policies();
    policies.insert(
        ADMINS.to_string(),
        Policy::implicit_meta("MAJORITY Admins"),
    );
    policies
}

fn meta_policies() -> PolicyMap {
    let mut policies = PolicyMap::new();
    policies.insert(READERS.to_string(), Policy::implicit_meta("ANY Readers"));
    policies.insert(WRITERS.to_string(), Policy::implicit_meta("ANY Writers"));
    policies
}

/// Admin rule over `admin_msp_ids`, each of which must be a member of the group
fn admin_rule(
    members: &OrganizationMap,
    admin_msp_ids: &[&str],
    group: &str,
) -> ReconcileResult<AdminRule> {
    if let Some(outsider) = admin_msp_ids.iter().find(|m| !members.contains_key(**m)) {
        return Err(ReconcileError::OrganizationResolution {
            msp_id: outsider.to_string(),
            reason: format!("admin organization is not a member of the {} group", group),
        });
    }
    Ok(AdminRule::for_admin_orgs(admin_msp_ids))
}

fn organization_map(orgs: Vec<OrganizationConfig>) -> ReconcileResult<OrganizationMap> {
    let mut map = OrganizationMap::new();
    for org in orgs {
        let msp_id = org.msp_id().to_string();
        if map.insert(msp_id.clone(), org).is_some() {
            return Err(ReconcileError::OrganizationResolution {
                msp_id,
                reason: "declared more than once in the same group".to_string(),
            });
        }
    }
    Ok(map)
}

fn resolution_error(msp_id: &str, err: ReconcileError) -> ReconcileError {
    let reason = match err {
        ReconcileError::OrganizationResolution { reason, .. } => reason,
        other => other.to_string(),
    };
    ReconcileError::OrganizationResolution {
        msp_id: msp_id.to_string(),
        reason,
    }
}
