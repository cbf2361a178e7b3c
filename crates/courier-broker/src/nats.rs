//! [`Broker`] backed by NATS JetStream.
//!
//! On connect the broker makes sure a stream named after the topic exists,
//! capturing `<topic>.*`. Each job is published to `<topic>.<job_id>` with
//! the job id as `Nats-Msg-Id`, so a retried publish inside the stream's
//! duplicate window is stored once. A send only succeeds once JetStream has
//! acknowledged the message as persisted.

use std::future::Future;

use anyhow::{Context, Result};
use async_nats::jetstream::context::{PublishError, PublishErrorKind};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_nats::{HeaderMap, ServerAddr};
use bytes::Bytes;
use courier_core::{Broker, BrokerError};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::BrokerConfig;

/// Header used by JetStream for duplicate detection.
pub const MESSAGE_ID_HEADER: &str = "Nats-Msg-Id";

/// A JetStream publisher shared by all requests.
///
/// Cloning is cheap; the underlying client multiplexes one connection.
#[derive(Debug, Clone)]
pub struct NatsBroker {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    topic: String,
}

impl NatsBroker {
    /// Connects to the configured servers and ensures the stream exists.
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        info!(
            servers = ?config.servers,
            topic = %config.topic,
            timeout_ms = config.connect_timeout.as_millis(),
            "Connecting to NATS"
        );

        let addrs = config
            .servers
            .iter()
            .map(|server| {
                server
                    .parse::<ServerAddr>()
                    .with_context(|| format!("invalid NATS server address '{server}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(config.connect_timeout)
            .connect(addrs)
            .await
            .context("Failed to connect to NATS")?;

        let broker = Self {
            jetstream: jetstream::new(client.clone()),
            client,
            topic: config.topic.clone(),
        };
        broker.ensure_stream().await?;

        info!("Connected to NATS");
        Ok(broker)
    }

    /// Creates the topic stream unless it already exists.
    ///
    /// An existing stream must capture the job subjects, otherwise every
    /// publish would fail.
    async fn ensure_stream(&self) -> Result<()> {
        if let Ok(stream) = self.jetstream.get_stream(&self.topic).await {
            check_subjects(&self.topic, &stream.cached_info().config.subjects)?;
            debug!(stream = %self.topic, "Stream already exists");
            return Ok(());
        }

        let config = StreamConfig {
            name: self.topic.clone(),
            subjects: vec![job_subjects(&self.topic)],
            description: Some("Jobs accepted by the courier ingestion gateway".to_string()),
            ..Default::default()
        };
        self.jetstream
            .create_stream(config)
            .await
            .with_context(|| format!("Failed to create stream '{}'", self.topic))?;

        info!(stream = %self.topic, "Created stream");
        Ok(())
    }

    /// Returns the topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Flushes buffered publishes to the server.
    pub async fn flush(&self) -> Result<()> {
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }

    async fn publish(&self, key: &str, message: Bytes) -> Result<(), PublishError> {
        let subject = subject(&self.topic, key);
        let mut headers = HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER, key);

        debug!(subject = %subject, bytes = message.len(), "Publishing job");

        let ack = self
            .jetstream
            .publish_with_headers(subject, headers, message)
            .await?;
        ack.await?;
        Ok(())
    }
}

impl Broker for NatsBroker {
    fn send(
        &self,
        key: &str,
        message: Bytes,
        deadline: Instant,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send {
        async move {
            match tokio::time::timeout_at(deadline, self.publish(key, message)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(classify(&e)),
                Err(_) => Err(BrokerError::DeadlineExceeded),
            }
        }
    }
}

/// Builds the subject for a job.
fn subject(topic: &str, key: &str) -> String {
    format!("{topic}.{key}")
}

/// The subject filter covering every job of `topic`.
fn job_subjects(topic: &str) -> String {
    format!("{topic}.*")
}

fn check_subjects(topic: &str, subjects: &[String]) -> Result<()> {
    let wanted = job_subjects(topic);
    let any_depth = format!("{topic}.>");
    anyhow::ensure!(
        subjects
            .iter()
            .any(|s| *s == wanted || *s == any_depth || s == ">"),
        "stream '{topic}' exists but its subjects {subjects:?} do not include '{wanted}'"
    );
    Ok(())
}

fn classify(error: &PublishError) -> BrokerError {
    match error.kind() {
        PublishErrorKind::TimedOut => BrokerError::DeadlineExceeded,
        PublishErrorKind::BrokenPipe => BrokerError::Unavailable(error.to_string()),
        PublishErrorKind::StreamNotFound => BrokerError::Rejected(error.to_string()),
        _ => BrokerError::Other(anyhow::anyhow!("JetStream publish failed: {error}")),
    }
}
