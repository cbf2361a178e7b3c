//! Prometheus metrics for Courier.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `courier_requests_total` | Counter | `status` | Requests by final status |
//! | `courier_request_duration_seconds` | Histogram | - | Request latency |
//! | `courier_enqueue_total` | Counter | `outcome` | Broker handoffs by outcome |
//! | `courier_enqueue_duration_seconds` | Histogram | - | Broker handoff latency |
//!
//! Recording functions are always safe to call. When [`init_metrics`] has not
//! installed a recorder the `metrics` macros are no-ops.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Request counter name.
pub const REQUESTS_TOTAL: &str = "courier_requests_total";
/// Request latency histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "courier_request_duration_seconds";
/// Enqueue counter name.
pub const ENQUEUE_TOTAL: &str = "courier_enqueue_total";
/// Enqueue latency histogram name.
pub const ENQUEUE_DURATION_SECONDS: &str = "courier_enqueue_duration_seconds";

/// Status label used for requests dropped before a response was produced.
pub const STATUS_CANCELLED: &str = "cancelled";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Histogram buckets for durations, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global recorder and starts the Prometheus HTTP listener.
///
/// Inside a Tokio runtime the listener is spawned onto it; otherwise the
/// exporter runs on its own background thread.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparseable address and
/// `TelemetryError::MetricsInit` if the exporter cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let mut builder = PrometheusBuilder::new().with_http_listener(addr);
    if !config.duration_buckets.is_empty() {
        for name in [REQUEST_DURATION_SECONDS, ENQUEUE_DURATION_SECONDS] {
            builder = builder
                .set_buckets_for_metric(Matcher::Full(name.to_string()), &config.duration_buckets)
                .map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?;
        }
    }

    builder
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    tracing::info!(metrics_addr = %addr, "Prometheus exporter listening");

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of ingestion requests by status");
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Ingestion request duration in seconds"
    );
    describe_counter!(ENQUEUE_TOTAL, "Total broker handoffs by outcome");
    describe_histogram!(
        ENQUEUE_DURATION_SECONDS,
        "Broker handoff duration in seconds"
    );
}

/// Records a completed (or cancelled) request.
///
/// `status` is the numeric status code, or [`STATUS_CANCELLED`].
pub fn record_request(status: &str, duration: Duration) {
    counter!(REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS).record(duration.as_secs_f64());
}

/// Records one broker handoff.
///
/// `outcome` is `"ok"` or the error kind of the failed handoff.
pub fn record_enqueue(outcome: &'static str, duration: Duration) {
    counter!(ENQUEUE_TOTAL, "outcome" => outcome).increment(1);
    histogram!(ENQUEUE_DURATION_SECONDS).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.addr, "0.0.0.0:9090");
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_metrics_is_noop() {
        assert!(init_metrics(&MetricsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
            ..Default::default()
        };
        let err = init_metrics(&config).unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidAddress(_)));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_request("202", Duration::from_millis(10));
        record_request(STATUS_CANCELLED, Duration::from_millis(3));
        record_enqueue("ok", Duration::from_millis(4));
        record_enqueue("enqueue_timeout", Duration::from_secs(5));
    }
}
