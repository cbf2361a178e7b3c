//! Access log middleware.
//!
//! Writes exactly one [`AccessRecord`] per request, on every exit path:
//!
//! - the response body was fully delivered ([`Outcome::Completed`])
//! - the response body was dropped before its end ([`Outcome::Aborted`])
//! - the request future was dropped before a response existed, e.g. because
//!   the client disconnected during the enqueue ([`Outcome::Cancelled`])
//!
//! The duration runs from request arrival (the context's start instant) to the
//! moment the record is written, and the byte count is taken from the response
//! body as it is polled by the connection. Records go to an injected
//! [`AccessLogSink`].

use crate::body::ObservedBody;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use courier_core::{CorrelationId, IngestErrorKind, JobId, RequestContext};
use courier_telemetry::metrics;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Span;

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response body was delivered to its end.
    Completed,
    /// A response was produced but its body was dropped before the end.
    Aborted,
    /// The request was dropped before a response was produced.
    Cancelled,
}

impl Outcome {
    /// Returns the outcome as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One access-log entry.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    /// Correlation id of the request.
    pub correlation_id: CorrelationId,
    /// Request method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Peer address, if known.
    pub remote_addr: Option<SocketAddr>,
    /// Response status; `None` when the request was cancelled.
    pub status: Option<StatusCode>,
    /// Time from arrival to the end of the response.
    pub duration: Duration,
    /// Response body bytes handed to the connection.
    pub bytes: u64,
    /// Job id, if one was generated.
    pub job_id: Option<JobId>,
    /// Failure classification, if the request was rejected.
    pub failure: Option<IngestErrorKind>,
    /// How the request ended.
    pub outcome: Outcome,
}

/// Destination for access records.
pub trait AccessLogSink: Send + Sync + 'static {
    /// Records one finished request.
    fn record(&self, record: &AccessRecord);
}

/// Access log that emits `tracing` events and request metrics.
///
/// Events are emitted as children of the span given at construction.
#[derive(Debug, Clone)]
pub struct TracingAccessLog {
    span: Span,
}

impl TracingAccessLog {
    /// Creates an access log emitting under `span`.
    #[must_use]
    pub fn new(span: Span) -> Self {
        Self { span }
    }
}

impl Default for TracingAccessLog {
    fn default() -> Self {
        Self::new(Span::none())
    }
}

macro_rules! access_event {
    ($level:ident, $span:expr, $record:expr, $message:literal) => {
        tracing::$level!(
            parent: $span,
            request_id = %$record.correlation_id,
            http.method = %$record.method,
            http.path = %$record.path,
            http.status_code = $record.status.map(|status| status.as_u16()),
            remote_addr = $record.remote_addr.map(tracing::field::display),
            duration_ms = $record.duration.as_secs_f64() * 1000.0,
            bytes = $record.bytes,
            job_id = $record.job_id.map(tracing::field::display),
            error.kind = $record.failure.map(IngestErrorKind::as_str),
            outcome = $record.outcome.as_str(),
            $message
        )
    };
}

impl AccessLogSink for TracingAccessLog {
    fn record(&self, record: &AccessRecord) {
        match (record.outcome, record.status) {
            (Outcome::Completed, Some(status)) if status.is_server_error() => {
                access_event!(error, &self.span, record, "Request failed");
            }
            (Outcome::Completed, _) => {
                access_event!(info, &self.span, record, "Request completed");
            }
            (Outcome::Aborted, _) => {
                access_event!(warn, &self.span, record, "Response aborted");
            }
            (Outcome::Cancelled, _) => {
                access_event!(warn, &self.span, record, "Request cancelled");
            }
        }

        let status = record.status.map_or_else(
            || metrics::STATUS_CANCELLED.to_string(),
            |status| status.as_u16().to_string(),
        );
        metrics::record_request(&status, record.duration);
    }
}

/// Access log that keeps records in memory.
///
/// Useful for asserting on logged requests in tests.
#[derive(Debug, Default)]
pub struct MemoryAccessLog {
    records: Mutex<Vec<AccessRecord>>,
}

impl MemoryAccessLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all records.
    #[must_use]
    pub fn records(&self) -> Vec<AccessRecord> {
        self.records.lock().clone()
    }
}

impl AccessLogSink for MemoryAccessLog {
    fn record(&self, record: &AccessRecord) {
        self.records.lock().push(record.clone());
    }
}

/// A record waiting for the request to end.
///
/// Writes itself as [`Outcome::Cancelled`] if dropped before [`finish`] runs.
///
/// [`finish`]: AccessLogger::finish
pub(crate) struct AccessLogger {
    sink: Arc<dyn AccessLogSink>,
    started_at: Instant,
    record: Option<AccessRecord>,
}

impl AccessLogger {
    fn start(sink: Arc<dyn AccessLogSink>, ctx: &RequestContext, request: &Request) -> Self {
        Self {
            sink,
            started_at: ctx.started_at(),
            record: Some(AccessRecord {
                correlation_id: ctx.correlation_id().clone(),
                method: request.method().clone(),
                path: request.uri().path().to_owned(),
                remote_addr: ctx.remote_addr(),
                status: None,
                duration: Duration::ZERO,
                bytes: 0,
                job_id: None,
                failure: None,
                outcome: Outcome::Cancelled,
            }),
        }
    }

    fn respond(&mut self, status: StatusCode, ctx: &RequestContext) {
        if let Some(record) = self.record.as_mut() {
            record.status = Some(status);
            record.job_id = ctx.job_id();
            record.failure = ctx.failure();
        }
    }

    /// Returns `true` if the request was a `HEAD`.
    pub(crate) fn is_head(&self) -> bool {
        self.record
            .as_ref()
            .is_some_and(|record| record.method == Method::HEAD)
    }

    /// Writes the record. Later calls are no-ops.
    pub(crate) fn finish(&mut self, outcome: Outcome, bytes: u64) {
        if let Some(mut record) = self.record.take() {
            record.duration = self.started_at.elapsed();
            record.bytes = bytes;
            record.outcome = outcome;
            self.sink.record(&record);
        }
    }
}

impl Drop for AccessLogger {
    fn drop(&mut self) {
        self.finish(Outcome::Cancelled, 0);
    }
}

/// Middleware that writes one access record per request.
#[derive(Clone)]
pub struct AccessLogMiddleware {
    sink: Arc<dyn AccessLogSink>,
}

impl AccessLogMiddleware {
    /// Creates the middleware writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AccessLogSink>) -> Self {
        Self { sink }
    }
}

impl std::fmt::Debug for AccessLogMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLogMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &'static str {
        "access_log"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut logger = AccessLogger::start(self.sink.clone(), ctx, &request);

            let response = next.run(ctx, request).await;

            logger.respond(response.status(), ctx);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, ObservedBody::new(body, logger).boxed_unsync())
        })
    }
}
