//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Everything the reconciler needs from the outside world: identity material,
//! certificate authorities, orderer admin endpoints, the ordering service, and
//! the sinks that receive pass outcomes.

use crate::domain::channel::ConfigBlock;
use crate::domain::envelope::SignedEnvelope;
use crate::domain::spec::OrdererNodeRef;
use crate::error::ReconcileResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// PEM certificate and private key of an organization admin
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct IdentityMaterial {
    pub cert_pem: String,
    pub key_pem: String,
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMaterial")
            .field("cert_pem", &self.cert_pem)
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

/// Admin identities of organizations, keyed by MSP id
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// `Ok(None)` when the store holds no identity for `msp_id`
    async fn identity(&self, msp_id: &str) -> ReconcileResult<Option<IdentityMaterial>>;
}

/// Root certificates published by a certificate authority
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaMaterial {
    pub sign_root_pem: String,
    pub tls_root_pem: String,
}

/// Host and port of an orderer's channel participation endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminEndpoint {
    pub host: String,
    pub port: u16,
}

impl AdminEndpoint {
    pub fn url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

/// Resolves cluster-managed references
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Root certificates of the CA `name` in `namespace`
    async fn certificate_authority(&self, name: &str, namespace: &str)
        -> ReconcileResult<CaMaterial>;

    /// Admin endpoint of a cluster-managed ordering node
    async fn orderer_admin_endpoint(&self, node: &OrdererNodeRef)
        -> ReconcileResult<AdminEndpoint>;
}

/// Mutual TLS material for an orderer admin call
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AdminTlsCredentials {
    pub client_cert_pem: String,
    pub client_key_pem: String,
    /// Root the orderer's server certificate must chain to
    pub tls_root_pem: String,
}

impl fmt::Debug for AdminTlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminTlsCredentials")
            .field("client_cert_pem", &self.client_cert_pem)
            .field("client_key_pem", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Request to join one ordering node to a channel
#[derive(Clone, Debug)]
pub struct JoinRequest {
    pub channel: String,
    /// Base URL of the admin endpoint, e.g. `https://orderer0:7053`
    pub admin_url: String,
    pub credentials: AdminTlsCredentials,
    pub block: ConfigBlock,
}

/// Raw HTTP outcome of an admin call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: String,
}

/// Channel participation API of ordering nodes
#[async_trait]
pub trait OrdererAdmin: Send + Sync {
    /// Submit the genesis block. Transport failures are `JoinProtocol` errors;
    /// any HTTP status is returned as a response.
    async fn join(&self, request: JoinRequest) -> ReconcileResult<AdminResponse>;
}

/// Acknowledgement of an accepted config update
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub transaction_id: String,
}

/// The replicated ordering service holding channel configuration
#[async_trait]
pub trait OrderingService: Send + Sync {
    /// Latest config block of `channel`
    async fn fetch_config_block(&self, channel: &str) -> ReconcileResult<ConfigBlock>;

    /// Broadcast a signed config update. Rejection is `SubmissionRejected`.
    async fn submit(&self, envelope: SignedEnvelope) -> ReconcileResult<SubmitReceipt>;
}

/// Final outcome of a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassStatus {
    Done { message: String },
    Failed { diagnostic: String },
}

impl PassStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// Outcome of one pass as persisted on the channel resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub channel: String,
    pub status: PassStatus,
    pub finished_at: DateTime<Utc>,
}

/// Persists pass outcomes
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report(&self, report: PassReport) -> ReconcileResult<()>;
}

/// Publishes the converged configuration for observers
#[async_trait]
pub trait ConfigSnapshotSink: Send + Sync {
    /// Store `document` under `name`/`key`, replacing any previous value
    async fn publish(&self, name: &str, key: &str, document: String) -> ReconcileResult<()>;
}
