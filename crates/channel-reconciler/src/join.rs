//! Orderer Join Coordinator
//!
//! Hands the genesis block to every ordering node listed by the channel's
//! ordering organizations. For each organization the external nodes go first,
//! then the cluster-managed ones.
//!
//! ```text
//! 201 Created            → Joined(ChannelInfo)
//! 405 Method Not Allowed → AlreadyJoined (node is a member already)
//! anything else          → Failed, remaining nodes are not attempted
//! ```

use crate::domain::builder::resolve_orderer_material;
use crate::domain::channel::ConfigBlock;
use crate::domain::spec::{ChannelSpec, OrdererOrganizationSpec};
use crate::error::{ReconcileError, ReconcileResult};
use crate::metrics;
use crate::ports::outbound::{
    AdminEndpoint, AdminResponse, AdminTlsCredentials, IdentityStore, JoinRequest, OrdererAdmin,
    OrganizationDirectory,
};
use reconciler_telemetry::log_channel_event;
use serde::{Deserialize, Serialize};

pub const STATUS_CREATED: u16 = 201;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;

/// Channel membership as reported by an ordering node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub name: String,
    pub url: String,
    pub consensus_relation: String,
    pub status: String,
    pub height: u64,
}

/// Outcome of joining one node
#[derive(Debug)]
pub enum JoinResult {
    Joined(ChannelInfo),
    AlreadyJoined,
    Failed(ReconcileError),
}

impl JoinResult {
    fn label(&self) -> &'static str {
        match self {
            Self::Joined(_) => "joined",
            Self::AlreadyJoined => "already_joined",
            Self::Failed(_) => "failed",
        }
    }
}

/// Joins counted over one pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub joined: Vec<ChannelInfo>,
    pub already_joined: usize,
}

/// Classify an admin endpoint response
pub fn interpret_response(admin_url: &str, channel: &str, response: &AdminResponse) -> JoinResult {
    let failure = |detail: String| {
        JoinResult::Failed(ReconcileError::JoinProtocol {
            url: admin_url.to_string(),
            channel: channel.to_string(),
            status: Some(response.status),
            detail,
        })
    };

    match response.status {
        STATUS_METHOD_NOT_ALLOWED => JoinResult::AlreadyJoined,
        STATUS_CREATED => match serde_json::from_str::<ChannelInfo>(&response.body) {
            Ok(info) => JoinResult::Joined(info),
            Err(e) => failure(format!("undecodable channel info: {}", e)),
        },
        status => failure(format!("status {}, response: {}", status, response.body)),
    }
}

/// Join every listed ordering node to `genesis.channel_id`. Stops at the first
/// failure.
///
/// Cluster-managed nodes are looked up in the directory one at a time, right
/// before their join, so an unknown node never blocks the nodes ahead of it.
pub async fn join_orderers(
    spec: &ChannelSpec,
    genesis: &ConfigBlock,
    admin: &dyn OrdererAdmin,
    directory: &dyn OrganizationDirectory,
    identities: &dyn IdentityStore,
) -> ReconcileResult<JoinSummary> {
    let mut summary = JoinSummary::default();

    for org in &spec.orderer_organizations {
        if org.external_orderers_to_join.is_empty() && org.orderers_to_join.is_empty() {
            continue;
        }
        let credentials = admin_credentials(org, directory, identities).await?;

        for node in &org.external_orderers_to_join {
            let endpoint = AdminEndpoint {
                host: node.host.clone(),
                port: node.admin_port,
            };
            join_node(admin, genesis, &endpoint, &credentials, &mut summary).await?;
        }
        for node in &org.orderers_to_join {
            let endpoint = directory.orderer_admin_endpoint(node).await?;
            join_node(admin, genesis, &endpoint, &credentials, &mut summary).await?;
        }
    }

    Ok(summary)
}

async fn join_node(
    admin: &dyn OrdererAdmin,
    genesis: &ConfigBlock,
    endpoint: &AdminEndpoint,
    credentials: &AdminTlsCredentials,
    summary: &mut JoinSummary,
) -> ReconcileResult<()> {
    let admin_url = endpoint.url();
    let request = JoinRequest {
        channel: genesis.channel_id.clone(),
        admin_url: admin_url.clone(),
        credentials: credentials.clone(),
        block: genesis.clone(),
    };

    let result = match admin.join(request).await {
        Ok(response) => interpret_response(&admin_url, &genesis.channel_id, &response),
        Err(e) => JoinResult::Failed(e),
    };
    metrics::record_join(result.label());

    match result {
        JoinResult::Joined(info) => {
            log_channel_event!(
                info,
                "Orderer joined channel",
                &genesis.channel_id,
                url = %admin_url,
                height = info.height
            );
            summary.joined.push(info);
        }
        JoinResult::AlreadyJoined => {
            log_channel_event!(
                debug,
                "Orderer already joined",
                &genesis.channel_id,
                url = %admin_url
            );
            summary.already_joined += 1;
        }
        JoinResult::Failed(e) => {
            log_channel_event!(
                error,
                "Orderer join failed",
                &genesis.channel_id,
                url = %admin_url,
                error = %e
            );
            return Err(e);
        }
    }
    Ok(())
}

async fn admin_credentials(
    org: &OrdererOrganizationSpec,
    directory: &dyn OrganizationDirectory,
    identities: &dyn IdentityStore,
) -> ReconcileResult<AdminTlsCredentials> {
    let material = resolve_orderer_material(org, directory).await?;
    let identity =
        identities
            .identity(&org.msp_id)
            .await?
            .ok_or_else(|| ReconcileError::OrganizationResolution {
                msp_id: org.msp_id.clone(),
                reason: "no admin identity for orderer organization".to_string(),
            })?;

    Ok(AdminTlsCredentials {
        client_cert_pem: identity.cert_pem.clone(),
        client_key_pem: identity.key_pem.clone(),
        tls_root_pem: material.tls_root_pem,
    })
}
