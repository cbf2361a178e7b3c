//! # Courier Config
//!
//! Typed configuration for the Courier gateway, loaded in layers:
//! defaults, then a TOML/JSON file, then `.env`, then `COURIER__*`
//! environment variables.
//!
//! | Key | Default |
//! |---|---|
//! | `server.http_addr` | `0.0.0.0:8080` |
//! | `server.shutdown_timeout_secs` | `10` |
//! | `ingest.max_payload_bytes` | `1048576` |
//! | `ingest.enqueue_timeout_ms` | `5000` |
//! | `broker.servers` | `["nats://localhost:4222"]` |
//! | `broker.topic` | `ingress-topic` |
//! | `broker.connect_timeout_ms` | `10000` |
//! | `telemetry.service_name` | `courier` |
//! | `telemetry.logging.level` | `info` |
//! | `telemetry.logging.format` | `json` |
//! | `telemetry.metrics.enabled` | `false` |
//! | `telemetry.metrics.addr` | `0.0.0.0:9090` |
//!
//! ## Example
//!
//! ```
//! use courier_config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_env_prefix("COURIER")
//!     .with_env_vars([("COURIER__BROKER__TOPIC", "orders")])
//!     .load()
//!     .unwrap();
//!
//! assert_eq!(config.broker.topic, "orders");
//! ```

#![doc(html_root_url = "https://docs.rs/courier-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::CourierConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{
    BrokerSection, IngestSection, LogFormat, LoggingSection, MetricsSection, ServerSection,
    TelemetrySection,
};
