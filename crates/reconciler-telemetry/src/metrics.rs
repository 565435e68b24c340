//! Prometheus text exposition of the default registry.
//!
//! Reconciler metrics are registered with `prometheus::register_*` macros, so
//! they all live in the default registry and a single gather covers them.

use prometheus::{Encoder, TextEncoder};

use crate::TelemetryError;

/// Encode every registered metric in the Prometheus text format
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{register_int_counter, IntCounter};

    #[test]
    fn test_encode_includes_registered_counter() {
        let counter: IntCounter = register_int_counter!(
            "reconciler_telemetry_test_total",
            "Counter registered by the encode test"
        )
        .unwrap();
        counter.inc_by(3);

        let text = encode_metrics().unwrap();
        assert!(text.contains("# TYPE reconciler_telemetry_test_total counter"));
        assert!(text.contains("reconciler_telemetry_test_total 3"));
    }
}
