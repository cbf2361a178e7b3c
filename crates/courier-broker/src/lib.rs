//! # Courier Broker
//!
//! NATS JetStream implementation of the [`courier_core::Broker`] trait.
//!
//! ```rust,ignore
//! use courier_broker::{BrokerConfig, NatsBroker};
//!
//! let broker = NatsBroker::connect(&BrokerConfig::default()).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/courier-broker/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod nats;

pub use config::BrokerConfig;
pub use nats::NatsBroker;
