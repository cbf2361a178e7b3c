//! Request context types.
//!
//! The [`RequestContext`] carries the per-request correlation state through the
//! middleware pipeline and into the ingestion handler. It is passed explicitly
//! by `&mut` reference; nothing about a request lives in task-local or global
//! storage.

use crate::envelope::JobId;
use crate::error::IngestErrorKind;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A correlation identifier joining logs across the gateway boundary.
///
/// Either taken from the inbound `X-Request-ID` header or freshly generated
/// as a UUID v7, which is time-ordered and sorts well in log stores.
///
/// # Example
///
/// ```
/// use courier_core::CorrelationId;
///
/// let id = CorrelationId::generate();
/// assert_eq!(id.as_str().len(), 36);
///
/// let inbound = CorrelationId::from_header("edge-7f3a").unwrap();
/// assert_eq!(inbound.as_str(), "edge-7f3a");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Longest inbound identifier that will be propagated.
    pub const MAX_LEN: usize = 128;

    /// Generates a fresh identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Accepts an inbound header value as a correlation id.
    ///
    /// Returns `None` when the value is empty, longer than [`Self::MAX_LEN`],
    /// or contains anything other than visible ASCII, so that the value can
    /// always be echoed back as a response header and written to logs as-is.
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty()
            || value.len() > Self::MAX_LEN
            || !value.bytes().all(|b| b.is_ascii_graphic())
        {
            return None;
        }
        Some(Self(value.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-request context that flows through the middleware pipeline.
///
/// Created when a request enters the pipeline and discarded once its response
/// has been logged:
/// - correlation id (set by the request-id stage)
/// - arrival instant, used for the access-log duration
/// - remote peer address, when known
/// - the job id, once the handler has generated one
/// - the failure classification, when the request was rejected
///
/// # Example
///
/// ```
/// use courier_core::RequestContext;
///
/// let ctx = RequestContext::new();
/// println!("Processing request: {}", ctx.correlation_id());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    started_at: Instant,
    remote_addr: Option<SocketAddr>,
    job_id: Option<JobId>,
    failure: Option<IngestErrorKind>,
}

impl RequestContext {
    /// Creates a context with a freshly generated correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            started_at: Instant::now(),
            remote_addr: None,
            job_id: None,
            failure: None,
        }
    }

    /// Returns a new context carrying the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Returns the correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Replaces the correlation id (used when one arrives with the request).
    pub fn set_correlation_id(&mut self, id: CorrelationId) {
        self.correlation_id = id;
    }

    /// Returns the instant the request entered the pipeline.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request entered the pipeline.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the peer address, if known.
    #[must_use]
    pub const fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Returns the job id generated for this request, if any.
    #[must_use]
    pub const fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    /// Records the job id generated for this request.
    pub fn set_job_id(&mut self, job_id: JobId) {
        self.job_id = Some(job_id);
    }

    /// Returns the failure classification, if the request was rejected.
    #[must_use]
    pub const fn failure(&self) -> Option<IngestErrorKind> {
        self.failure
    }

    /// Records why the request was rejected.
    pub fn set_failure(&mut self, kind: IngestErrorKind) {
        self.failure = Some(kind);
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
