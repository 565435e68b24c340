//! # reconciler-telemetry
//!
//! Logging, trace export and metrics exposition for the channel reconciler.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reconciler_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).await.expect("telemetry");
//!     // reconcile channels
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `channel-reconciler` | Service name in traces |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset | OTLP gRPC endpoint, export disabled when unset |
//! | `CR_LOG_LEVEL` | `RUST_LOG`, else `info` | Log filter directives |
//! | `CR_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `CR_JSON_LOGS` | `true` in Kubernetes | JSON formatted logs |
//! | `CR_ENVIRONMENT` | `dev` | `deployment.environment` resource attribute |

mod config;
mod logging;
mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::encode_metrics;
pub use tracing_setup::{env_filter, TracingGuard};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize OpenTelemetry tracer: {0}")]
    TracerInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to encode metrics: {0}")]
    MetricsEncode(String),
}

/// Install the global subscriber and, when configured, OTLP export.
///
/// Hold the returned guard for the lifetime of the process; dropping it
/// flushes pending spans.
pub async fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let tracing = tracing_setup::init_tracing(&config).await?;
    Ok(TelemetryGuard { tracing })
}

/// Guard that keeps telemetry active. Drop to flush and shut down.
pub struct TelemetryGuard {
    tracing: TracingGuard,
}

impl TelemetryGuard {
    pub fn exporting_traces(&self) -> bool {
        self.tracing.exporting()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry");
    }
}
