//! Broker connection settings.

use std::time::Duration;

/// Default NATS server.
pub const DEFAULT_SERVER: &str = "nats://localhost:4222";

/// Default topic (stream name and subject prefix).
pub const DEFAULT_TOPIC: &str = "ingress-topic";

/// Default connection timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Where and how to publish jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// NATS server URLs; the client picks among them.
    pub servers: Vec<String>,
    /// Stream name. Jobs are published to `<topic>.<job_id>`.
    pub topic: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_SERVER.to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Returns `true` if `topic` can be used as a single NATS subject token
/// and stream name.
///
/// ```
/// use courier_broker::config::is_valid_topic;
///
/// assert!(is_valid_topic("ingress-topic"));
/// assert!(!is_valid_topic("jobs.*"));
/// ```
#[must_use]
pub fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic
            .chars()
            .all(|c| c.is_ascii_graphic() && !matches!(c, '.' | '*' | '>' | '/' | '\\'))
}
