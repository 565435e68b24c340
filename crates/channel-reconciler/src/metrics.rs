//! # Reconciler Metrics
//!
//! Prometheus metrics for channel reconciliation passes.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! channel-reconciler = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `channel_reconcile_passes_total` - Counter of passes (by outcome)
//! - `channel_reconcile_pass_seconds` - Histogram of pass duration
//! - `channel_orderer_joins_total` - Counter of join results (by result)
//! - `channel_convergence_polls_total` - Counter of convergence fetches
//! - `channel_signatures_collected_total` - Counter of signatures collected

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Passes, labeled by outcome (`no_change`, `updated`, or an error kind)
    pub static ref PASSES: IntCounterVec = register_int_counter_vec!(
        "channel_reconcile_passes_total",
        "Total number of reconciliation passes",
        &["outcome"]
    )
    .expect("Failed to create PASSES metric");

    /// Pass duration
    pub static ref PASS_DURATION: Histogram = register_histogram!(
        "channel_reconcile_pass_seconds",
        "Duration of reconciliation passes in seconds"
    )
    .expect("Failed to create PASS_DURATION metric");

    /// Orderer join results, labeled by result (`joined`, `already_joined`, `failed`)
    pub static ref ORDERER_JOINS: IntCounterVec = register_int_counter_vec!(
        "channel_orderer_joins_total",
        "Total number of orderer join attempts",
        &["result"]
    )
    .expect("Failed to create ORDERER_JOINS metric");

    /// Convergence fetches issued by the poller
    pub static ref CONVERGENCE_POLLS: IntCounter = register_int_counter!(
        "channel_convergence_polls_total",
        "Total number of convergence fetches"
    )
    .expect("Failed to create CONVERGENCE_POLLS metric");

    /// Signatures added to config update envelopes
    pub static ref SIGNATURES_COLLECTED: IntCounter = register_int_counter!(
        "channel_signatures_collected_total",
        "Total number of config update signatures collected"
    )
    .expect("Failed to create SIGNATURES_COLLECTED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a finished pass
#[cfg(feature = "metrics")]
pub fn record_pass(outcome: &str, seconds: f64) {
    PASSES.with_label_values(&[outcome]).inc();
    PASS_DURATION.observe(seconds);
}

/// Record one orderer join result
#[cfg(feature = "metrics")]
pub fn record_join(result: &str) {
    ORDERER_JOINS.with_label_values(&[result]).inc();
}

/// Record one convergence fetch
#[cfg(feature = "metrics")]
pub fn record_convergence_poll() {
    CONVERGENCE_POLLS.inc();
}

/// Record signatures collected for one envelope
#[cfg(feature = "metrics")]
pub fn record_signatures(count: u64) {
    SIGNATURES_COLLECTED.inc_by(count);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_pass(_outcome: &str, _seconds: f64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_join(_result: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_convergence_poll() {}

#[cfg(not(feature = "metrics"))]
pub fn record_signatures(_count: u64) {}
