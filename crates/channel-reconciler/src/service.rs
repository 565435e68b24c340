//! Channel Reconciler - one pass over one channel
//!
//! ```text
//! BuildingConfig → JoiningOrderers → FetchingCurrent → Diffing
//!     ├── no change ─────────────────────────────────────────────┐
//!     └── changes → CollectingSignatures → Submitting ──────────┤
//!                                                                ↓
//!                                            Polling → Done | Failed
//! ```
//!
//! Any error moves the pass to `Failed` and is reported verbatim to the
//! status sink.

use crate::collector::collect_signatures;
use crate::config::ReconcilerConfig;
use crate::convergence::{await_convergence, Convergence};
use crate::domain::builder::build_channel_config;
use crate::domain::channel::ConfigBlock;
use crate::domain::diff::{compute_update, DiffOutcome};
use crate::domain::envelope::{SignaturePolicy, SignedEnvelope};
use crate::domain::spec::ChannelSpec;
use crate::error::{ReconcileError, ReconcileResult};
use crate::join::join_orderers;
use crate::metrics;
use crate::ports::inbound::{PassChange, PassOutcome, ReconcileApi};
use crate::ports::outbound::{
    ConfigSnapshotSink, IdentityStore, OrdererAdmin, OrderingService, OrganizationDirectory,
    PassReport, PassStatus, StatusSink,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reconciler_telemetry::log_channel_event;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Snapshot document key inside the `<channel>-config` entry
pub const SNAPSHOT_KEY: &str = "channel.json";
pub const COMPLETED_MESSAGE: &str = "Channel setup completed";

/// Phase of a reconciliation pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassPhase {
    BuildingConfig,
    JoiningOrderers,
    FetchingCurrent,
    Diffing,
    CollectingSignatures,
    Submitting,
    Polling,
    Done,
    Failed,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BuildingConfig => "building_config",
            Self::JoiningOrderers => "joining_orderers",
            Self::FetchingCurrent => "fetching_current",
            Self::Diffing => "diffing",
            Self::CollectingSignatures => "collecting_signatures",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outbound collaborators of the reconciler
#[derive(Clone)]
pub struct ReconcilerPorts {
    pub ordering_service: Arc<dyn OrderingService>,
    pub orderer_admin: Arc<dyn OrdererAdmin>,
    pub directory: Arc<dyn OrganizationDirectory>,
    pub identities: Arc<dyn IdentityStore>,
    pub status: Arc<dyn StatusSink>,
    pub snapshots: Arc<dyn ConfigSnapshotSink>,
}

/// Reconciles channel specs against the ordering service
pub struct ChannelReconciler {
    config: ReconcilerConfig,
    ports: ReconcilerPorts,
    /// Latest phase per channel
    phases: RwLock<HashMap<String, PassPhase>>,
}

impl ChannelReconciler {
    pub fn new(config: ReconcilerConfig, ports: ReconcilerPorts) -> Self {
        Self {
            config,
            ports,
            phases: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Phase the latest pass of `channel` is in, or ended in
    pub fn phase(&self, channel: &str) -> Option<PassPhase> {
        self.phases.read().get(channel).copied()
    }

    fn enter(&self, channel: &str, phase: PassPhase) {
        tracing::debug!(channel, phase = %phase, "Entering phase");
        self.phases.write().insert(channel.to_string(), phase);
    }

    #[instrument(skip_all, fields(channel = %spec.name, pass_id = %pass_id))]
    async fn run_pass(&self, spec: &ChannelSpec, pass_id: Uuid) -> ReconcileResult<PassOutcome> {
        let channel = spec.name.as_str();

        self.enter(channel, PassPhase::BuildingConfig);
        let target = build_channel_config(spec, self.ports.directory.as_ref()).await?;
        let genesis = ConfigBlock::genesis(channel, &target)?;

        self.enter(channel, PassPhase::JoiningOrderers);
        let joins = join_orderers(
            spec,
            &genesis,
            self.ports.orderer_admin.as_ref(),
            self.ports.directory.as_ref(),
            self.ports.identities.as_ref(),
        )
        .await?;

        self.enter(channel, PassPhase::FetchingCurrent);
        let current = self.fetch_current(channel).await?;

        self.enter(channel, PassPhase::Diffing);
        let (change, convergence) = match compute_update(&current, &target)? {
            DiffOutcome::NoChange => {
                log_channel_event!(info, "No differences detected", channel);
                (PassChange::NoChange, Convergence::AnyBlock)
            }
            DiffOutcome::Update(update) => {
                log_channel_event!(
                    info,
                    "Channel config update computed",
                    channel,
                    base_sequence = update.base_sequence,
                    add = update.add_organizations.len(),
                    remove = update.remove_organizations.len(),
                    policies = update.application_policies.is_some(),
                    acls = update.acls.is_some()
                );

                self.enter(channel, PassPhase::CollectingSignatures);
                let policy = SignaturePolicy::from_config(&target)?;
                let envelope = collect_signatures(
                    SignedEnvelope::unsigned(&update)?,
                    &policy,
                    self.ports.identities.as_ref(),
                )
                .await?;
                let signers = envelope
                    .valid_signers(&policy)
                    .into_iter()
                    .map(str::to_string)
                    .collect();

                self.enter(channel, PassPhase::Submitting);
                let receipt = self.ports.ordering_service.submit(envelope).await?;
                log_channel_event!(
                    info,
                    "Config update submitted",
                    channel,
                    tx_id = %receipt.transaction_id
                );

                (
                    PassChange::Updated {
                        transaction_id: receipt.transaction_id,
                        added: update
                            .add_organizations
                            .iter()
                            .map(|o| o.msp_id().to_string())
                            .collect(),
                        removed: update.remove_organizations.clone(),
                        signers,
                    },
                    Convergence::AtLeastSequence(update.base_sequence + 1),
                )
            }
        };

        self.enter(channel, PassPhase::Polling);
        let converged = await_convergence(
            Arc::clone(&self.ports.ordering_service),
            channel,
            convergence,
            self.config.poll_interval,
            self.config.convergence_deadline,
        )
        .await?;
        self.publish_snapshot(channel, &converged).await?;

        self.enter(channel, PassPhase::Done);
        Ok(PassOutcome {
            pass_id,
            channel: channel.to_string(),
            change,
            orderers_joined: joins.joined.len(),
            converged,
        })
    }

    /// Initial fetch of the live config, retried a bounded number of times
    async fn fetch_current(&self, channel: &str) -> ReconcileResult<ConfigBlock> {
        let attempts = self.config.fetch_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.ports.ordering_service.fetch_config_block(channel).await {
                Ok(block) => return Ok(block),
                Err(e) => {
                    warn!(channel, attempt, error = %e, "Failed to fetch config block");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.fetch_retry_delay).await;
            }
        }

        Err(ReconcileError::OrderingService {
            channel: channel.to_string(),
            attempts,
            reason: last_error,
        })
    }

    async fn publish_snapshot(&self, channel: &str, block: &ConfigBlock) -> ReconcileResult<()> {
        let document = serde_json::to_string_pretty(&block.to_document()?).map_err(|e| {
            ReconcileError::Sink {
                reason: format!("failed to render channel config: {}", e),
            }
        })?;
        self.ports
            .snapshots
            .publish(&format!("{}-config", channel), SNAPSHOT_KEY, document)
            .await
    }

    async fn report(&self, pass_id: Uuid, channel: &str, status: PassStatus) -> ReconcileResult<()> {
        self.ports
            .status
            .report(PassReport {
                pass_id,
                channel: channel.to_string(),
                status,
                finished_at: Utc::now(),
            })
            .await
    }
}

#[async_trait]
impl ReconcileApi for ChannelReconciler {
    async fn reconcile(&self, spec: &ChannelSpec) -> ReconcileResult<PassOutcome> {
        let pass_id = Uuid::new_v4();
        let started = Instant::now();

        let result = self.run_pass(spec, pass_id).await;
        let seconds = started.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                let label = match outcome.change {
                    PassChange::NoChange => "no_change",
                    PassChange::Updated { .. } => "updated",
                };
                metrics::record_pass(label, seconds);
                info!(
                    channel = %spec.name,
                    pass_id = %pass_id,
                    outcome = label,
                    sequence = outcome.converged.sequence,
                    "Reconciliation pass completed"
                );

                self.report(
                    pass_id,
                    &spec.name,
                    PassStatus::Done {
                        message: COMPLETED_MESSAGE.to_string(),
                    },
                )
                .await?;
                Ok(outcome)
            }
            Err(e) => {
                let failed_in = self.phase(&spec.name);
                self.enter(&spec.name, PassPhase::Failed);
                metrics::record_pass(e.kind(), seconds);
                error!(
                    channel = %spec.name,
                    pass_id = %pass_id,
                    phase = ?failed_in,
                    kind = e.kind(),
                    error = %e,
                    "Reconciliation pass failed"
                );

                let diagnostic = e.to_string();
                if let Err(sink_error) = self
                    .report(pass_id, &spec.name, PassStatus::Failed { diagnostic })
                    .await
                {
                    error!(channel = %spec.name, error = %sink_error, "Failed to report pass status");
                }
                Err(e)
            }
        }
    }
}
