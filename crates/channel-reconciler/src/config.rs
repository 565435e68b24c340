//! Reconciler timing configuration

use std::env;
use std::time::Duration;

/// Timing knobs of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Delay between convergence fetches
    pub poll_interval: Duration,

    /// How long the caller waits for convergence
    pub convergence_deadline: Duration,

    /// Attempts for the initial fetch of the current config
    pub fetch_attempts: u32,

    /// Delay between initial fetch attempts
    pub fetch_retry_delay: Duration,

    /// Per-request timeout of orderer admin calls
    pub admin_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            convergence_deadline: Duration::from_secs(12),
            fetch_attempts: 5,
            fetch_retry_delay: Duration::from_millis(1500),
            admin_timeout: Duration::from_secs(30),
        }
    }
}

impl ReconcilerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CR_POLL_INTERVAL_MS` (default: 1000)
    /// - `CR_CONVERGENCE_DEADLINE_MS` (default: 12000)
    /// - `CR_FETCH_ATTEMPTS` (default: 5)
    /// - `CR_FETCH_RETRY_DELAY_MS` (default: 1500)
    /// - `CR_ADMIN_TIMEOUT_MS` (default: 30000)
    ///
    /// Unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        // a zero interval would poll without pausing
        let positive_millis = |key: &str, default: Duration| {
            Some(millis(key, default))
                .filter(|d| !d.is_zero())
                .unwrap_or(default)
        };

        Self {
            poll_interval: positive_millis("CR_POLL_INTERVAL_MS", defaults.poll_interval),
            convergence_deadline: millis(
                "CR_CONVERGENCE_DEADLINE_MS",
                defaults.convergence_deadline,
            ),
            fetch_attempts: lookup("CR_FETCH_ATTEMPTS")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.fetch_attempts),
            fetch_retry_delay: millis("CR_FETCH_RETRY_DELAY_MS", defaults.fetch_retry_delay),
            admin_timeout: millis("CR_ADMIN_TIMEOUT_MS", defaults.admin_timeout),
        }
    }
}
