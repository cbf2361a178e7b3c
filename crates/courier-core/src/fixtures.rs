//! Test fixtures for Courier development and testing.
//!
//! [`RecordingBroker`] is an in-memory [`Broker`] that records every send and
//! answers with a scripted behaviour. It is used by the handler, middleware and
//! server test suites.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use courier_core::fixtures::RecordingBroker;
//! use courier_core::Broker;
//! use tokio::time::{Duration, Instant};
//!
//! # tokio_test::block_on(async {
//! let broker = RecordingBroker::accepting();
//! let deadline = Instant::now() + Duration::from_secs(1);
//! broker.send("job-1", Bytes::from_static(b"{}"), deadline).await.unwrap();
//!
//! assert_eq!(broker.call_count(), 1);
//! assert_eq!(broker.sent()[0].key, "job-1");
//! # });
//! ```

use crate::broker::{Broker, BrokerError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A message captured by [`RecordingBroker`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    /// The key passed to `send`.
    pub key: String,
    /// The message bytes passed to `send`.
    pub message: Bytes,
    /// The deadline passed to `send`.
    pub deadline: Instant,
}

impl SentMessage {
    /// Parses the captured message as JSON.
    ///
    /// # Panics
    ///
    /// Panics if the message is not valid JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.message).expect("broker message should be JSON")
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Accept,
    Reject(String),
    Delay(Duration),
    Hang,
}

/// An in-memory broker double.
#[derive(Debug)]
pub struct RecordingBroker {
    behavior: Behavior,
    sent: Mutex<Vec<SentMessage>>,
    abandoned: AtomicUsize,
    called: Notify,
}

impl RecordingBroker {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
            abandoned: AtomicUsize::new(0),
            called: Notify::new(),
        }
    }

    /// A broker that acknowledges every message immediately.
    #[must_use]
    pub fn accepting() -> Self {
        Self::with_behavior(Behavior::Accept)
    }

    /// A broker that rejects every message with `reason`.
    #[must_use]
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Reject(reason.into()))
    }

    /// A broker that acknowledges after `delay`.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self::with_behavior(Behavior::Delay(delay))
    }

    /// A broker that never answers.
    #[must_use]
    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    /// Returns a snapshot of every message sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Returns the number of `send` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Returns how many `send` futures were dropped before completing.
    #[must_use]
    pub fn abandoned_count(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` sends have started.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            self.called.notified().await;
        }
    }
}

/// Counts the send as abandoned unless disarmed.
struct AbandonGuard<'a> {
    counter: &'a AtomicUsize,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Broker for RecordingBroker {
    async fn send(&self, key: &str, message: Bytes, deadline: Instant) -> Result<(), BrokerError> {
        self.sent.lock().push(SentMessage {
            key: key.to_owned(),
            message,
            deadline,
        });
        self.called.notify_one();

        let mut guard = AbandonGuard {
            counter: &self.abandoned,
            armed: true,
        };

        let result = match &self.behavior {
            Behavior::Accept => Ok(()),
            Behavior::Reject(reason) => Err(BrokerError::Rejected(reason.clone())),
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            Behavior::Hang => std::future::pending().await,
        };

        guard.armed = false;
        result
    }
}
