//! # Courier Server
//!
//! The HTTP side of the Courier ingestion gateway:
//!
//! - [`PayloadGuard`]: bounded body reading
//! - [`IngestHandler`]: validate, wrap and enqueue a job
//! - [`Server`]: hyper HTTP/1 server with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_server::{IngestConfig, IngestHandler, Server, ServerConfig};
//! use courier_middleware::TracingAccessLog;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = IngestHandler::new(Arc::new(broker), IngestConfig::default());
//!     let server = Server::new(
//!         ServerConfig::default(),
//!         handler,
//!         Arc::new(TracingAccessLog::default()),
//!     );
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/courier-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handler;
pub mod payload;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::ServerError;
pub use handler::{IngestConfig, IngestHandler};
pub use payload::PayloadGuard;
pub use server::{Server, INGEST_PATH};
pub use shutdown::ShutdownSignal;
