//! # Courier
//!
//! **HTTP ingestion gateway**
//!
//! Courier accepts JSON documents on `POST /ingest`, wraps each one in a job
//! envelope with a fresh job id and a receive timestamp, publishes it to NATS
//! JetStream, and answers `202 {"job_id": "..."}` once the broker has
//! acknowledged it.
//!
//! ```text
//! Request → RequestId → AccessLog → IngestHandler → Broker
//!                                         ↓
//! Response ← RequestId ← AccessLog ←──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().with_env_prefix("COURIER").load()?;
//!     courier::run(config).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/courier/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;

pub use courier_broker as broker;
pub use courier_config as config;
pub use courier_core as core;
pub use courier_middleware as middleware;
pub use courier_server as server;
pub use courier_telemetry as telemetry;

use courier_broker::NatsBroker;
use courier_config::CourierConfig;
use courier_middleware::TracingAccessLog;
use courier_server::{IngestHandler, Server, ShutdownSignal};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use courier_broker::{BrokerConfig, NatsBroker};
    pub use courier_config::{ConfigLoader, CourierConfig};
    pub use courier_core::{Broker, BrokerError, IngestError, JobEnvelope, JobId, RequestContext};
    pub use courier_server::{IngestConfig, IngestHandler, Server, ServerConfig, ShutdownSignal};
}

/// Connects to the broker and serves until SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns an error if the broker is unreachable or the server cannot bind.
pub async fn run(config: CourierConfig) -> anyhow::Result<()> {
    run_with_shutdown(config, ShutdownSignal::with_os_signals()).await
}

/// Connects to the broker and serves until `shutdown` triggers, then drains
/// connections and flushes the broker.
///
/// # Errors
///
/// Returns an error if the broker is unreachable or the server cannot bind.
pub async fn run_with_shutdown(
    config: CourierConfig,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let span = tracing::info_span!("courier", service = %config.telemetry.service_name);

    let broker = NatsBroker::connect(&config.broker_config())
        .await
        .context("failed to initialise the NATS broker")?;
    let broker = Arc::new(broker);

    let handler =
        IngestHandler::new(Arc::clone(&broker), config.ingest_config()).with_span(span.clone());
    let server = Server::new(
        config.server_config(),
        handler,
        Arc::new(TracingAccessLog::new(span)),
    );

    server
        .run_with_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    if let Err(e) = broker.flush().await {
        tracing::warn!(error = %e, "Failed to flush broker on shutdown");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
