//! In-memory ordering service
//!
//! Holds the latest config block per channel and applies signed config updates
//! the way the replicated service does: the update must be computed against the
//! current sequence, and its signatures must satisfy the application admin
//! policy of the resulting configuration.

use crate::domain::channel::ConfigBlock;
use crate::domain::envelope::{SignaturePolicy, SignedEnvelope};
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{OrderingService, SubmitReceipt};
use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

/// [`OrderingService`] backed by process memory
#[derive(Default)]
pub struct InMemoryOrderingService {
    channels: RwLock<HashMap<String, ConfigBlock>>,
    submissions: RwLock<Vec<SignedEnvelope>>,
    fetch_failures: AtomicU32,
    unavailable: AtomicBool,
    reject_submissions: AtomicBool,
    fetch_calls: AtomicU32,
}

impl InMemoryOrderingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `block.channel_id` from a genesis block. Returns `false` if the
    /// channel already exists.
    pub fn create_channel(&self, block: ConfigBlock) -> bool {
        let mut channels = self.channels.write();
        if channels.contains_key(&block.channel_id) {
            return false;
        }
        info!(channel = %block.channel_id, "Channel created");
        channels.insert(block.channel_id.clone(), block);
        true
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.read().contains_key(channel)
    }

    pub fn current_block(&self, channel: &str) -> Option<ConfigBlock> {
        self.channels.read().get(channel).cloned()
    }

    /// Fail the next `count` fetches
    pub fn fail_next_fetches(&self, count: u32) {
        self.fetch_failures.store(count, Ordering::SeqCst);
    }

    /// Fail every fetch until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    /// Envelopes accepted so far
    pub fn submissions(&self) -> Vec<SignedEnvelope> {
        self.submissions.read().clone()
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        if self.unavailable.load(Ordering::SeqCst) {
            return true;
        }
        self.fetch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderingService for InMemoryOrderingService {
    async fn fetch_config_block(&self, channel: &str) -> ReconcileResult<ConfigBlock> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let unavailable = |reason: &str| ReconcileError::OrderingService {
            channel: channel.to_string(),
            attempts: 1,
            reason: reason.to_string(),
        };

        if self.take_failure() {
            return Err(unavailable("ordering service unavailable"));
        }
        self.current_block(channel)
            .ok_or_else(|| unavailable("channel does not exist"))
    }

    async fn submit(&self, envelope: SignedEnvelope) -> ReconcileResult<SubmitReceipt> {
        let channel = envelope.channel_id.clone();
        let rejected = |reason: String| ReconcileError::SubmissionRejected {
            channel: channel.clone(),
            reason,
        };

        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(rejected("ordering service refused the update".to_string()));
        }

        let update = envelope.decode_update().map_err(|e| rejected(e.to_string()))?;
        if update.channel_id != channel {
            return Err(rejected(format!(
                "update targets channel {}",
                update.channel_id
            )));
        }

        let mut channels = self.channels.write();
        let current = channels
            .get(&channel)
            .ok_or_else(|| rejected("channel does not exist".to_string()))?;

        if update.base_sequence != current.sequence {
            return Err(rejected(format!(
                "update computed against sequence {}, current is {}",
                update.base_sequence, current.sequence
            )));
        }

        let current_config = current.decode_config().map_err(|e| rejected(e.to_string()))?;
        let next_config = update.apply_to(&current_config);
        let policy = SignaturePolicy::from_config(&next_config).map_err(|e| rejected(e.to_string()))?;
        envelope
            .check_quorum(&policy)
            .map_err(|e| rejected(e.to_string()))?;

        let next = ConfigBlock {
            channel_id: channel.clone(),
            number: current.number + 1,
            sequence: current.sequence + 1,
            data: next_config.encode()?,
        };
        let transaction_id = hex::encode(Sha256::digest(envelope.to_bytes()?));

        debug!(
            channel = %channel,
            sequence = next.sequence,
            tx_id = %transaction_id,
            "Config update committed"
        );
        channels.insert(channel, next);
        self.submissions.write().push(envelope);

        Ok(SubmitReceipt { transaction_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diff::{diff_configs, DiffOutcome};
    use crate::domain::identity::SigningIdentity;
    use crate::test_support::{admin_identity, generate_ca, sample_config};

    fn service_with(msp_ids: &[&str]) -> InMemoryOrderingService {
        let service = InMemoryOrderingService::new();
        let genesis = ConfigBlock::genesis("demo", &sample_config(msp_ids)).unwrap();
        assert!(service.create_channel(genesis));
        service
    }

    fn sign(envelope: &mut SignedEnvelope, msp_id: &str) {
        envelope.add_signature(admin_identity(msp_id).sign(&envelope.payload).unwrap());
    }

    fn envelope_adding(service: &InMemoryOrderingService, msp_ids: &[&str]) -> SignedEnvelope {
        let block = service.current_block("demo").unwrap();
        let current = block.decode_config().unwrap();
        let target = sample_config(msp_ids);
        let DiffOutcome::Update(update) = diff_configs("demo", block.sequence, &current, &target)
        else {
            panic!("expected an update");
        };
        SignedEnvelope::unsigned(&update).unwrap()
    }

    #[tokio::test]
    async fn test_create_channel_once() {
        let service = service_with(&["Org1MSP"]);
        let genesis = ConfigBlock::genesis("demo", &sample_config(&["Org1MSP"])).unwrap();
        assert!(!service.create_channel(genesis));
    }

    #[tokio::test]
    async fn test_fetch_failures_then_success() {
        let service = service_with(&["Org1MSP"]);
        service.fail_next_fetches(2);

        assert!(service.fetch_config_block("demo").await.is_err());
        assert!(service.fetch_config_block("demo").await.is_err());
        let block = service.fetch_config_block("demo").await.unwrap();
        assert_eq!(block.sequence, 0);
        assert_eq!(service.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_submit_applies_update() {
        let service = service_with(&["Org1MSP", "Org2MSP"]);
        let mut envelope = envelope_adding(&service, &["Org1MSP", "Org2MSP", "Org3MSP"]);
        // MAJORITY of three
        sign(&mut envelope, "Org1MSP");
        sign(&mut envelope, "Org3MSP");

        let receipt = service.submit(envelope).await.unwrap();
        assert_eq!(receipt.transaction_id.len(), 64);

        let block = service.current_block("demo").unwrap();
        assert_eq!((block.number, block.sequence), (1, 1));
        assert!(block.decode_config().unwrap().application_org("Org3MSP").is_some());
        assert_eq!(service.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_quorum_is_rejected() {
        let service = service_with(&["Org1MSP", "Org2MSP"]);
        let mut envelope = envelope_adding(&service, &["Org1MSP", "Org2MSP", "Org3MSP"]);
        sign(&mut envelope, "Org1MSP");

        let result = service.submit(envelope).await;
        assert!(matches!(
            result,
            Err(ReconcileError::SubmissionRejected { .. })
        ));
        assert_eq!(service.current_block("demo").unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn test_self_signed_admins_are_rejected() {
        let service = service_with(&["Org1MSP", "Org2MSP"]);
        let mut envelope = envelope_adding(&service, &["Org1MSP", "Org2MSP", "Org3MSP"]);
        let outsider = generate_ca("outsider");
        for msp_id in ["Org1MSP", "Org2MSP", "Org3MSP"] {
            let forged =
                SigningIdentity::from_pem(msp_id, &outsider.cert_pem, &outsider.key_pem).unwrap();
            envelope.add_signature(forged.sign(&envelope.payload).unwrap());
        }

        match service.submit(envelope).await {
            Err(ReconcileError::SubmissionRejected { reason, .. }) => {
                assert!(reason.contains("signature"), "{}", reason)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(service.current_block("demo").unwrap().sequence, 0);
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let service = service_with(&["Org1MSP"]);
        let mut first = envelope_adding(&service, &["Org1MSP", "Org2MSP"]);
        sign(&mut first, "Org1MSP");
        sign(&mut first, "Org2MSP");
        let stale = first.clone();

        service.submit(first).await.unwrap();
        assert!(service.submit(stale).await.is_err());
    }
}
