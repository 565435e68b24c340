//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and trace export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name for traces and logs
    pub service_name: String,

    /// OTLP endpoint; trace export is disabled when unset
    pub otlp_endpoint: Option<String>,

    /// Log level filter (trace, debug, info, warn, error) or directives
    pub log_level: String,

    /// Whether to write logs to stdout
    pub console_output: bool,

    /// Whether logs are JSON formatted
    pub json_logs: bool,

    /// Deployment environment (dev, staging, prod)
    pub environment: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "channel-reconciler".to_string(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            environment: "dev".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OTEL_SERVICE_NAME`: Service name (default: channel-reconciler)
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: unset, no export)
    /// - `CR_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `CR_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `CR_JSON_LOGS`: Enable JSON logs (default: true inside Kubernetes)
    /// - `CR_ENVIRONMENT`: Deployment environment (default: dev)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let in_cluster = lookup("KUBERNETES_SERVICE_HOST").is_some();

        Self {
            service_name: lookup("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| "channel-reconciler".to_string()),

            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),

            log_level: lookup("CR_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "info".to_string()),

            console_output: lookup("CR_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: lookup("CR_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(in_cluster),

            environment: lookup("CR_ENVIRONMENT").unwrap_or_else(|| "dev".to_string()),
        }
    }
}
