//! The root [`CourierConfig`] and its conversions into runtime settings.

use std::net::SocketAddr;
use std::time::Duration;

use courier_broker::BrokerConfig;
use courier_server::{IngestConfig, ServerConfig};
use courier_telemetry::config::TelemetryConfig;
use courier_telemetry::logging::{create_env_filter, LogConfig};
use courier_telemetry::metrics::MetricsConfig;
use serde::{Deserialize, Serialize};

use crate::schema::{BrokerSection, IngestSection, LogFormat, ServerSection, TelemetrySection};
use crate::ConfigError;

/// Complete Courier configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// ```
/// use courier_config::CourierConfig;
///
/// let config = CourierConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.broker.topic, "ingress-topic");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// HTTP server.
    #[serde(default)]
    pub server: ServerSection,

    /// Ingestion limits.
    #[serde(default)]
    pub ingest: IngestSection,

    /// NATS broker.
    #[serde(default)]
    pub broker: BrokerSection,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl CourierConfig {
    /// Checks every section, returning the first problem found.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)?;
        positive("server.shutdown_timeout_secs", self.server.shutdown_timeout_secs)?;

        positive("ingest.max_payload_bytes", self.ingest.max_payload_bytes as u64)?;
        positive("ingest.enqueue_timeout_ms", self.ingest.enqueue_timeout_ms)?;

        if self.broker.servers.is_empty() {
            return Err(ConfigError::invalid_value(
                "broker.servers",
                "at least one server is required",
            ));
        }
        if self.broker.servers.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "broker.servers",
                "server URLs must not be blank",
            ));
        }
        if !courier_broker::config::is_valid_topic(&self.broker.topic) {
            return Err(ConfigError::invalid_value(
                "broker.topic",
                format!(
                    "'{}' is not a valid subject token (no whitespace, '.', '*' or '>')",
                    self.broker.topic
                ),
            ));
        }
        positive("broker.connect_timeout_ms", self.broker.connect_timeout_ms)?;

        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.service_name",
                "must not be empty",
            ));
        }
        if let Err(e) = create_env_filter(&self.telemetry.logging.level) {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                e.to_string(),
            ));
        }
        if self.telemetry.metrics.enabled {
            parse_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        Ok(())
    }

    /// HTTP server settings.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::builder()
            .http_addr(self.server.http_addr.clone())
            .shutdown_timeout(Duration::from_secs(self.server.shutdown_timeout_secs))
            .build()
    }

    /// Per-request ingestion limits.
    #[must_use]
    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            max_payload_bytes: self.ingest.max_payload_bytes,
            enqueue_timeout: Duration::from_millis(self.ingest.enqueue_timeout_ms),
        }
    }

    /// Broker connection settings.
    #[must_use]
    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            servers: self.broker.servers.clone(),
            topic: self.broker.topic.clone(),
            connect_timeout: Duration::from_millis(self.broker.connect_timeout_ms),
        }
    }

    /// Logging and metrics settings.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        let logging = &self.telemetry.logging;
        let metrics = &self.telemetry.metrics;

        TelemetryConfig::builder()
            .service_name(&self.telemetry.service_name)
            .logging(LogConfig {
                level: logging.level.clone(),
                json_format: logging.format == LogFormat::Json,
                ..LogConfig::default()
            })
            .metrics(MetricsConfig {
                enabled: metrics.enabled,
                addr: metrics.addr.clone(),
                ..MetricsConfig::default()
            })
            .build()
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {value}")))
}

fn positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid_value(field, "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: &CourierConfig) -> String {
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(CourierConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_http_addr() {
        let mut config = CourierConfig::default();
        config.server.http_addr = "localhost".to_string();
        assert_eq!(invalid_field(&config), "server.http_addr");
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = CourierConfig::default();
        config.ingest.max_payload_bytes = 0;
        assert_eq!(invalid_field(&config), "ingest.max_payload_bytes");

        let mut config = CourierConfig::default();
        config.ingest.enqueue_timeout_ms = 0;
        assert_eq!(invalid_field(&config), "ingest.enqueue_timeout_ms");

        let mut config = CourierConfig::default();
        config.server.shutdown_timeout_secs = 0;
        assert_eq!(invalid_field(&config), "server.shutdown_timeout_secs");
    }

    #[test]
    fn test_rejects_bad_broker_settings() {
        let mut config = CourierConfig::default();
        config.broker.servers.clear();
        assert_eq!(invalid_field(&config), "broker.servers");

        let mut config = CourierConfig::default();
        config.broker.topic = "jobs.*".to_string();
        assert_eq!(invalid_field(&config), "broker.topic");
    }

    #[test]
    fn test_metrics_addr_only_checked_when_enabled() {
        let mut config = CourierConfig::default();
        config.telemetry.metrics.addr = "nowhere".to_string();
        assert!(config.validate().is_ok());

        config.telemetry.metrics.enabled = true;
        assert_eq!(invalid_field(&config), "telemetry.metrics.addr");
    }

    #[test]
    fn test_rejects_bad_log_filter() {
        let mut config = CourierConfig::default();
        config.telemetry.logging.level = "courier=loud".to_string();
        assert_eq!(invalid_field(&config), "telemetry.logging.level");
    }

    #[test]
    fn test_runtime_conversions() {
        let mut config = CourierConfig::default();
        config.server.http_addr = "127.0.0.1:9000".to_string();
        config.ingest.enqueue_timeout_ms = 750;
        config.broker.servers = vec!["nats://a:4222".to_string(), "nats://b:4222".to_string()];
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.metrics.enabled = true;

        let server = config.server_config();
        assert_eq!(server.http_addr(), "127.0.0.1:9000");
        assert_eq!(server.shutdown_timeout(), Duration::from_secs(10));

        let ingest = config.ingest_config();
        assert_eq!(ingest.max_payload_bytes, 1_048_576);
        assert_eq!(ingest.enqueue_timeout, Duration::from_millis(750));

        let broker = config.broker_config();
        assert_eq!(broker.servers.len(), 2);
        assert_eq!(broker.topic, "ingress-topic");

        let telemetry = config.telemetry_config();
        assert_eq!(telemetry.service_name, "courier");
        assert!(!telemetry.logging.json_format);
        assert!(telemetry.metrics.enabled);
    }
}
