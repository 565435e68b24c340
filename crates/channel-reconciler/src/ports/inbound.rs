//! Driving Ports (API - Inbound)

use crate::domain::channel::ConfigBlock;
use crate::domain::spec::ChannelSpec;
use crate::error::ReconcileResult;
use async_trait::async_trait;
use uuid::Uuid;

/// What a successful pass changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassChange {
    /// Live configuration already matched the target
    NoChange,
    /// A config update was signed and committed
    Updated {
        transaction_id: String,
        added: Vec<String>,
        removed: Vec<String>,
        signers: Vec<String>,
    },
}

/// Result of a successful pass
#[derive(Clone, Debug)]
pub struct PassOutcome {
    pub pass_id: Uuid,
    pub channel: String,
    pub change: PassChange,
    /// Number of ordering nodes newly joined in this pass
    pub orderers_joined: usize,
    /// Config block observed after convergence
    pub converged: ConfigBlock,
}

/// Primary reconciliation API
///
/// Called by the watch layer once per observed change of a channel resource.
/// Passes for one channel must not overlap.
#[async_trait]
pub trait ReconcileApi: Send + Sync {
    /// Drive the live channel towards `spec`. The outcome is also reported to
    /// the status sink, success or failure.
    async fn reconcile(&self, spec: &ChannelSpec) -> ReconcileResult<PassOutcome>;
}
