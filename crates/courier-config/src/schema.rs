//! Configuration sections.
//!
//! Every field has a serde default, so a file only needs the keys it
//! overrides. Unknown keys are rejected.

use serde::{Deserialize, Serialize};

/// HTTP server section.
///
/// ```
/// use courier_config::ServerSection;
///
/// let section = ServerSection::default();
/// assert_eq!(section.http_addr, "0.0.0.0:8080");
/// assert_eq!(section.shutdown_timeout_secs, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// How long shutdown waits for open connections, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    courier_server::config::DEFAULT_HTTP_ADDR.to_string()
}

fn default_shutdown_timeout() -> u64 {
    courier_server::config::DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

/// Ingestion limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IngestSection {
    /// Largest accepted request body, in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Broker handoff timeout, in milliseconds.
    #[serde(default = "default_enqueue_timeout")]
    pub enqueue_timeout_ms: u64,
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            enqueue_timeout_ms: default_enqueue_timeout(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    courier_server::payload::DEFAULT_MAX_PAYLOAD_BYTES
}

fn default_enqueue_timeout() -> u64 {
    courier_server::handler::DEFAULT_ENQUEUE_TIMEOUT_SECS * 1000
}

/// NATS broker section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BrokerSection {
    /// NATS server URLs.
    #[serde(default = "default_servers")]
    pub servers: Vec<String>,

    /// Stream name and subject prefix.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Connection timeout, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            servers: default_servers(),
            topic: default_topic(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

fn default_servers() -> Vec<String> {
    vec![courier_broker::config::DEFAULT_SERVER.to_string()]
}

fn default_topic() -> String {
    courier_broker::config::DEFAULT_TOPIC.to_string()
}

fn default_connect_timeout() -> u64 {
    courier_broker::config::DEFAULT_CONNECT_TIMEOUT_MS
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name reported in the startup log.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Prometheus settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// `EnvFilter` directive, e.g. `info` or `courier=debug,async_nats=warn`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Whether to install the exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Listen address of the exporter.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}
