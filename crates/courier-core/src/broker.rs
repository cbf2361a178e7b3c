//! The broker capability consumed by the ingestion handler.

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;

/// Errors reported by a [`Broker`].
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// The broker refused the message.
    #[error("broker rejected message: {0}")]
    Rejected(String),

    /// The broker did not acknowledge before the supplied deadline.
    #[error("broker deadline exceeded")]
    DeadlineExceeded,

    /// Any other client failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A message broker that accepts keyed messages.
///
/// This is the only capability the gateway needs from its broker: hand over
/// one message and learn whether it was acknowledged. A single instance is
/// shared by all in-flight requests, so implementations must be safe for
/// concurrent use and handle their own synchronisation.
///
/// Implementations must give up once `deadline` has passed. The returned
/// future may also be dropped at any await point when the caller goes away;
/// dropping it must abandon the send.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use courier_core::{Broker, BrokerError};
/// use tokio::time::Instant;
///
/// struct Discard;
///
/// impl Broker for Discard {
///     async fn send(&self, _key: &str, _message: Bytes, _deadline: Instant) -> Result<(), BrokerError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Broker: Send + Sync + 'static {
    /// Sends `message` keyed by `key`, resolving once it is acknowledged.
    fn send(
        &self,
        key: &str,
        message: Bytes,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;
}

impl<B: Broker> Broker for Arc<B> {
    fn send(
        &self,
        key: &str,
        message: Bytes,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send {
        (**self).send(key, message, deadline)
    }
}
