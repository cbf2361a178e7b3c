//! # Courier Core
//!
//! Core types and traits for the Courier ingestion gateway.
//!
//! This crate provides the foundational types used throughout Courier:
//!
//! - [`RequestContext`] - Per-request correlation context
//! - [`CorrelationId`] - Request correlation identifier (UUID v7 when generated)
//! - [`JobId`] / [`JobEnvelope`] - The immutable job wrapper handed to the broker
//! - [`IngestError`] - Error taxonomy of the ingestion pipeline
//! - [`Broker`] - The narrow capability the gateway needs from a message broker

#![doc(html_root_url = "https://docs.rs/courier-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod broker;
mod context;
mod envelope;
mod error;
pub mod fixtures;

pub use broker::{Broker, BrokerError};
pub use context::{CorrelationId, RequestContext};
pub use envelope::{JobEnvelope, JobId};
pub use error::{BoxError, IngestError, IngestErrorKind};
