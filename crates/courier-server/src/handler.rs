//! The `/ingest` endpoint.
//!
//! For every request the handler:
//!
//! 1. rejects any verb other than `POST` with `405` and `Allow: POST`
//! 2. reads the body through the [`PayloadGuard`]
//! 3. assigns a fresh [`JobId`] and wraps the body in a [`JobEnvelope`]
//! 4. hands the envelope to the broker, keyed by job id, within the enqueue
//!    timeout
//! 5. answers `202 {"job_id": ...}`
//!
//! Failures map to the status of their [`IngestError`]. Server-side failures
//! answer a generic `500` body; the cause only reaches the logs.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{Broker, BrokerError, IngestError, JobEnvelope, JobId, RequestContext};
use courier_middleware::{BoxFuture, Endpoint, Request, Response, ResponseExt};
use courier_telemetry::metrics;
use http::header::{HeaderValue, ALLOW};
use http::{Method, StatusCode};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{field, Instrument, Span};

use crate::payload::{PayloadGuard, DEFAULT_MAX_PAYLOAD_BYTES};

/// Default enqueue timeout in seconds.
pub const DEFAULT_ENQUEUE_TIMEOUT_SECS: u64 = 5;

/// Limits applied to each ingestion request.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum accepted body size in bytes.
    pub max_payload_bytes: usize,
    /// Maximum time the broker handoff may take, serialization included.
    pub enqueue_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            enqueue_timeout: Duration::from_secs(DEFAULT_ENQUEUE_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct Accepted {
    job_id: JobId,
}

/// Handles `/ingest` requests against a broker.
pub struct IngestHandler<B> {
    broker: Arc<B>,
    guard: PayloadGuard,
    enqueue_timeout: Duration,
    span: Span,
}

impl<B: Broker> IngestHandler<B> {
    /// Creates a handler publishing to `broker`.
    #[must_use]
    pub fn new(broker: Arc<B>, config: IngestConfig) -> Self {
        Self {
            broker,
            guard: PayloadGuard::new(config.max_payload_bytes),
            enqueue_timeout: config.enqueue_timeout,
            span: Span::none(),
        }
    }

    /// Sets the parent span for per-request `ingest` spans.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Returns the broker.
    #[must_use]
    pub fn broker(&self) -> &Arc<B> {
        &self.broker
    }

    /// Processes one request.
    pub async fn handle(&self, ctx: &mut RequestContext, request: Request) -> Response {
        let span = tracing::info_span!(
            parent: &self.span,
            "ingest",
            request_id = %ctx.correlation_id(),
            job_id = field::Empty,
        );

        match self.ingest(ctx, request).instrument(span.clone()).await {
            Ok(job_id) => {
                span.in_scope(|| tracing::debug!("Job accepted"));
                Response::json(StatusCode::ACCEPTED, &Accepted { job_id })
            }
            Err(err) => {
                ctx.set_failure(err.kind());
                span.in_scope(|| log_rejection(&err));
                rejection(&err)
            }
        }
    }

    async fn ingest(
        &self,
        ctx: &mut RequestContext,
        request: Request,
    ) -> Result<JobId, IngestError> {
        if request.method() != Method::POST {
            return Err(IngestError::MethodNotAllowed {
                method: request.method().clone(),
            });
        }

        let body = self.guard.read(request.into_body()).await?;

        let job_id = JobId::new();
        let envelope = JobEnvelope::build(job_id, &body)?;
        drop(body);

        ctx.set_job_id(job_id);
        Span::current().record("job_id", field::display(job_id));

        self.enqueue(envelope).await?;
        Ok(job_id)
    }

    /// Serializes and publishes `envelope`, bounded by the enqueue timeout.
    async fn enqueue(&self, envelope: JobEnvelope) -> Result<(), IngestError> {
        let started = Instant::now();
        let deadline = started + self.enqueue_timeout;

        let result = self.publish(envelope, deadline).await;

        let outcome = match &result {
            Ok(()) => "ok",
            Err(err) => err.kind().as_str(),
        };
        metrics::record_enqueue(outcome, started.elapsed());

        result
    }

    async fn publish(&self, envelope: JobEnvelope, deadline: Instant) -> Result<(), IngestError> {
        let key = envelope.job_id().to_string();
        let message = envelope.into_wire()?;

        match tokio::time::timeout_at(deadline, self.broker.send(&key, message, deadline)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(BrokerError::DeadlineExceeded)) | Err(_) => Err(IngestError::EnqueueTimeout {
                timeout: self.enqueue_timeout,
            }),
            Ok(Err(e)) => Err(IngestError::BrokerSend(e)),
        }
    }
}

impl<B: Broker> Endpoint for IngestHandler<B> {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response> {
        Box::pin(self.handle(ctx, request))
    }
}

impl<B> std::fmt::Debug for IngestHandler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestHandler")
            .field("max_payload_bytes", &self.guard.limit())
            .field("enqueue_timeout", &self.enqueue_timeout)
            .finish_non_exhaustive()
    }
}

fn rejection(err: &IngestError) -> Response {
    let mut response = Response::error(err.status_code(), err.client_message());
    if matches!(err, IngestError::MethodNotAllowed { .. }) {
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
    }
    response
}

fn log_rejection(err: &IngestError) {
    let kind = err.kind();
    match err {
        IngestError::MethodNotAllowed { method } => {
            tracing::debug!(http.method = %method, "Method not allowed");
        }
        _ if kind.is_server_error() => {
            tracing::error!(error = %err, error.kind = kind.as_str(), "Enqueue failed");
        }
        _ => {
            tracing::warn!(error = %err, error.kind = kind.as_str(), "Request rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::ChunkedBody;
    use courier_core::fixtures::RecordingBroker;
    use courier_core::IngestErrorKind;
    use courier_middleware::types::request_body;
    use http_body_util::BodyExt;

    fn handler(broker: RecordingBroker) -> IngestHandler<RecordingBroker> {
        IngestHandler::new(Arc::new(broker), IngestConfig::default())
    }

    fn post(body: impl Into<bytes::Bytes>) -> Request {
        http::Request::builder()
            .method(Method::POST)
            .uri("/ingest")
            .body(request_body(body))
            .unwrap()
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_handle_future_is_send() {
        let handler = handler(RecordingBroker::accepting());
        let mut ctx = RequestContext::new();
        let future = handler.handle(&mut ctx, post("{}"));
        assert_send(&future);

        let endpoint: &dyn Endpoint = &handler;
        let mut ctx = RequestContext::new();
        assert_send(&endpoint.call(&mut ctx, post("{}")));
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_and_publishes_envelope() {
        let handler = handler(RecordingBroker::accepting());
        let mut ctx = RequestContext::new();

        let response = handler.handle(&mut ctx, post(r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let job_id = body["job_id"].as_str().unwrap().to_string();
        assert_eq!(ctx.job_id().map(|id| id.to_string()), Some(job_id.clone()));
        assert_eq!(ctx.failure(), None);

        let sent = handler.broker().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key, job_id);

        let envelope = sent[0].json();
        assert_eq!(envelope["job_id"], job_id.as_str());
        assert_eq!(envelope["payload"], serde_json::json!({"a": 1}));
        assert!(envelope["received_at"].is_string());
    }

    #[tokio::test]
    async fn test_payload_is_forwarded_verbatim() {
        let handler = handler(RecordingBroker::accepting());
        let raw = r#"[ 1, "two" ,{"x" : null} ]"#;

        let response = handler.handle(&mut RequestContext::new(), post(raw)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let message = handler.broker().sent()[0].message.clone();
        let text = std::str::from_utf8(&message).unwrap();
        assert!(text.contains(&format!(r#""payload":{raw}"#)));
    }

    #[tokio::test]
    async fn test_rejects_other_methods_without_publishing() {
        let handler = handler(RecordingBroker::accepting());

        for method in [Method::GET, Method::PUT, Method::DELETE, Method::HEAD] {
            let mut ctx = RequestContext::new();
            let request = http::Request::builder()
                .method(method)
                .uri("/ingest")
                .body(request_body(r#"{"a":1}"#))
                .unwrap();

            let response = handler.handle(&mut ctx, request).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(response.headers().get(ALLOW).unwrap(), "POST");
            assert_eq!(ctx.failure(), Some(IngestErrorKind::MethodNotAllowed));
            assert_eq!(ctx.job_id(), None);
        }

        assert_eq!(handler.broker().call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let handler = handler(RecordingBroker::accepting());
        let mut ctx = RequestContext::new();

        let response = handler
            .handle(&mut ctx, post(vec![b' '; 2 * 1024 * 1024]))
            .await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_text(response).await, "Payload Too Large");
        assert_eq!(ctx.failure(), Some(IngestErrorKind::PayloadTooLarge));
        assert_eq!(handler.broker().call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_and_empty_bodies_are_bad_requests() {
        let handler = handler(RecordingBroker::accepting());

        for body in ["not json", "", r#"{"a":"#, "{} {}"] {
            let mut ctx = RequestContext::new();
            let response = handler.handle(&mut ctx, post(body)).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body:?}");
            assert_eq!(body_text(response).await, "invalid JSON body");
            assert_eq!(ctx.failure(), Some(IngestErrorKind::InvalidPayload));
            assert_eq!(ctx.job_id(), None);
        }

        assert_eq!(handler.broker().call_count(), 0);
    }

    #[tokio::test]
    async fn test_broken_body_stream_is_bad_request() {
        let handler = handler(RecordingBroker::accepting());
        let mut ctx = RequestContext::new();
        let request = http::Request::builder()
            .method(Method::POST)
            .uri("/ingest")
            .body(ChunkedBody::failing_after(vec![b"{\"a\":"]).boxed())
            .unwrap();

        let response = handler.handle(&mut ctx, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Bad Request");
        assert_eq!(ctx.failure(), Some(IngestErrorKind::BodyRead));
    }

    #[tokio::test]
    async fn test_broker_failure_hides_cause() {
        let handler = handler(RecordingBroker::rejecting("stream courier not found"));
        let mut ctx = RequestContext::new();

        let response = handler.handle(&mut ctx, post(r#"{"a":1}"#)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response).await;
        assert_eq!(text, "Internal Server Error");
        assert!(!text.contains("courier"));
        assert_eq!(ctx.failure(), Some(IngestErrorKind::BrokerSend));
        assert_eq!(handler.broker().call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_broker_times_out() {
        let handler = IngestHandler::new(
            Arc::new(RecordingBroker::hanging()),
            IngestConfig {
                enqueue_timeout: Duration::from_millis(250),
                ..IngestConfig::default()
            },
        );
        let mut ctx = RequestContext::new();

        let started = Instant::now();
        let response = handler.handle(&mut ctx, post(r#"{"a":1}"#)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ctx.failure(), Some(IngestErrorKind::EnqueueTimeout));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(handler.broker().abandoned_count(), 1);

        let sent = handler.broker().sent();
        assert_eq!(sent[0].deadline, started + Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_within_timeout_is_accepted() {
        let handler = IngestHandler::new(
            Arc::new(RecordingBroker::delayed(Duration::from_millis(100))),
            IngestConfig {
                enqueue_timeout: Duration::from_millis(250),
                ..IngestConfig::default()
            },
        );

        let response = handler
            .handle(&mut RequestContext::new(), post("true"))
            .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_identical_requests_get_distinct_jobs() {
        let handler = handler(RecordingBroker::accepting());

        let mut first_ctx = RequestContext::new();
        let mut second_ctx = RequestContext::new();
        let (first, second) = tokio::join!(
            handler.handle(&mut first_ctx, post(r#"{"a":1}"#)),
            handler.handle(&mut second_ctx, post(r#"{"a":1}"#)),
        );

        assert_eq!(first.status(), StatusCode::ACCEPTED);
        assert_eq!(second.status(), StatusCode::ACCEPTED);
        assert_ne!(first_ctx.job_id(), second_ctx.job_id());

        let sent = handler.broker().sent();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].key, sent[1].key);
    }

    #[tokio::test]
    async fn test_dropping_request_abandons_broker_send() {
        let handler = handler(RecordingBroker::hanging());
        let mut ctx = RequestContext::new();

        {
            let request = handler.handle(&mut ctx, post(r#"{"a":1}"#));
            tokio::pin!(request);
            tokio::select! {
                _ = &mut request => panic!("hanging broker should not answer"),
                () = handler.broker().wait_for_calls(1) => {}
            }
        }

        assert_eq!(handler.broker().call_count(), 1);
        assert_eq!(handler.broker().abandoned_count(), 1);
    }
}
