//! Convergence Poller
//!
//! A background task fetches the channel's config block until it reaches the
//! required sequence and hands the block back over a oneshot channel. The
//! caller bounds the wait; once it gives up the receiver is dropped and the
//! task exits on its next iteration.
//!
//! ```text
//! caller ──spawn──→ poller ──fetch──→ ordering service
//!   │                  │ (sleep poll_interval on error or stale block)
//!   └──timeout(deadline)──── oneshot ←──┘
//! ```

use crate::domain::channel::ConfigBlock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::metrics;
use crate::ports::outbound::OrderingService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Shortest pause between two fetches
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Block the poller waits for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Convergence {
    /// Any block will do (nothing was submitted)
    AnyBlock,
    /// Sequence must be at least this value
    AtLeastSequence(u64),
}

impl Convergence {
    pub fn is_reached_by(&self, block: &ConfigBlock) -> bool {
        match self {
            Self::AnyBlock => true,
            Self::AtLeastSequence(sequence) => block.sequence >= *sequence,
        }
    }
}

/// Wait up to `deadline` for `channel` to reach `convergence`.
///
/// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] when shorter.
pub async fn await_convergence(
    service: Arc<dyn OrderingService>,
    channel: &str,
    convergence: Convergence,
    poll_interval: Duration,
    deadline: Duration,
) -> ReconcileResult<ConfigBlock> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(poll(
        service,
        channel.to_string(),
        convergence,
        poll_interval.max(MIN_POLL_INTERVAL),
        tx,
    ));

    match tokio::time::timeout(deadline, rx).await {
        Ok(Ok(block)) => Ok(block),
        Ok(Err(_)) => Err(ReconcileError::OrderingService {
            channel: channel.to_string(),
            attempts: 0,
            reason: "convergence poller stopped without a result".to_string(),
        }),
        Err(_) => Err(ReconcileError::ConvergenceTimeout {
            channel: channel.to_string(),
            waited_ms: deadline.as_millis() as u64,
        }),
    }
}

async fn poll(
    service: Arc<dyn OrderingService>,
    channel: String,
    convergence: Convergence,
    poll_interval: Duration,
    tx: oneshot::Sender<ConfigBlock>,
) {
    let mut attempt: u32 = 0;
    loop {
        if tx.is_closed() {
            debug!(channel = %channel, attempt, "Convergence wait abandoned, poller exiting");
            return;
        }

        attempt += 1;
        metrics::record_convergence_poll();

        match service.fetch_config_block(&channel).await {
            Ok(block) if convergence.is_reached_by(&block) => {
                debug!(
                    channel = %channel,
                    attempt,
                    sequence = block.sequence,
                    "Channel configuration converged"
                );
                let _ = tx.send(block);
                return;
            }
            Ok(block) => {
                debug!(
                    channel = %channel,
                    attempt,
                    sequence = block.sequence,
                    wanted = ?convergence,
                    "Config block not yet updated"
                );
            }
            Err(e) => {
                warn!(channel = %channel, attempt, error = %e, "Error fetching config block");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryOrderingService;
    use crate::test_support::sample_config;
    use tokio::time::Instant;

    fn service() -> Arc<InMemoryOrderingService> {
        let service = Arc::new(InMemoryOrderingService::new());
        service.create_channel(ConfigBlock::genesis("demo", &sample_config(&["Org1MSP"])).unwrap());
        service
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let service = service();
        service.fail_next_fetches(2);

        let started = Instant::now();
        let block = await_convergence(
            service.clone(),
            "demo",
            Convergence::AnyBlock,
            Duration::from_secs(1),
            Duration::from_secs(12),
        )
        .await
        .unwrap();

        assert_eq!(block.channel_id, "demo");
        assert_eq!(service.fetch_calls(), 3);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_times_out_at_deadline() {
        let service = service();
        service.set_unavailable(true);

        let started = Instant::now();
        let result = await_convergence(
            service.clone(),
            "demo",
            Convergence::AnyBlock,
            Duration::from_secs(1),
            Duration::from_secs(12),
        )
        .await;

        assert!(started.elapsed() >= Duration::from_secs(12));
        match result {
            Err(ReconcileError::ConvergenceTimeout { channel, waited_ms }) => {
                assert_eq!(channel, "demo");
                assert_eq!(waited_ms, 12_000);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        // The abandoned poller stops fetching
        tokio::time::sleep(Duration::from_secs(2)).await;
        let calls = service.fetch_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(service.fetch_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_required_sequence() {
        let service = service();

        let result = await_convergence(
            service.clone(),
            "demo",
            Convergence::AtLeastSequence(1),
            Duration::from_secs(1),
            Duration::from_secs(3),
        )
        .await;

        assert!(matches!(result, Err(ReconcileError::ConvergenceTimeout { .. })));
        assert!(service.fetch_calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_pauses() {
        let service = service();
        service.set_unavailable(true);

        let result = await_convergence(
            service.clone(),
            "demo",
            Convergence::AnyBlock,
            Duration::ZERO,
            Duration::from_secs(1),
        )
        .await;

        assert!(matches!(result, Err(ReconcileError::ConvergenceTimeout { .. })));
        assert!(service.fetch_calls() <= 101, "{} fetches", service.fetch_calls());
    }

    #[test]
    fn test_convergence_predicate() {
        let block = ConfigBlock {
            channel_id: "demo".to_string(),
            number: 4,
            sequence: 2,
            data: Vec::new(),
        };
        assert!(Convergence::AnyBlock.is_reached_by(&block));
        assert!(Convergence::AtLeastSequence(2).is_reached_by(&block));
        assert!(!Convergence::AtLeastSequence(3).is_reached_by(&block));
    }
}
