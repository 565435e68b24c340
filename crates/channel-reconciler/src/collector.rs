//! Signature Collector
//!
//! Gathers one signature per required admin organization over the payload of
//! a config update envelope.
//!
//! | Admin rule | Candidates | Threshold |
//! |------------|------------|-----------|
//! | `OR('A.admin',...)` | every listed org | all of them |
//! | `MAJORITY Admins` | target application orgs | ⌊n/2⌋+1 |
//!
//! A candidate without an identity in the store is skipped; the quorum check
//! afterwards decides whether the envelope is still good enough. A store that
//! fails outright aborts collection.

use crate::domain::envelope::{SignaturePolicy, SignedEnvelope};
use crate::domain::identity::SigningIdentity;
use crate::error::ReconcileResult;
use crate::metrics;
use crate::ports::outbound::IdentityStore;
use reconciler_telemetry::log_org_event;
use tracing::warn;

/// Sign `envelope` with every candidate of `policy` the store can provide
pub async fn collect_signatures(
    mut envelope: SignedEnvelope,
    policy: &SignaturePolicy,
    store: &dyn IdentityStore,
) -> ReconcileResult<SignedEnvelope> {
    let mut collected = 0u64;

    for msp_id in policy.candidates() {
        let Some(material) = store.identity(msp_id).await? else {
            warn!(
                channel = %envelope.channel_id,
                msp_id = %msp_id,
                "No admin identity available, skipping signer"
            );
            continue;
        };

        let identity = SigningIdentity::from_material(msp_id, &material)?;
        let signature = identity.sign(&envelope.payload)?;
        envelope.add_signature(signature);
        collected += 1;

        log_org_event!(
            debug,
            "Config update signed",
            msp_id,
            channel = %envelope.channel_id
        );
    }

    metrics::record_signatures(collected);
    envelope.check_quorum(policy)?;
    Ok(envelope)
}
