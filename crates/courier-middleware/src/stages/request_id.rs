//! Request ID middleware.
//!
//! Extracts a correlation id from the inbound `X-Request-ID` header or
//! generates a fresh UUID v7 when the header is missing or unusable. The id is
//! stored in the [`RequestContext`] and always echoed back in the
//! `X-Request-ID` response header, so clients can match their requests with
//! gateway logs.

use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use courier_core::{CorrelationId, RequestContext};
use http::HeaderValue;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that extracts or generates correlation ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    /// Creates a new Request ID middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn extract(request: &Request) -> Option<CorrelationId> {
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(CorrelationId::from_header)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let correlation_id = Self::extract(&request).unwrap_or_else(CorrelationId::generate);
            let header = HeaderValue::from_str(correlation_id.as_str()).ok();
            ctx.set_correlation_id(correlation_id);

            let mut response = next.run(ctx, request).await;

            if let Some(header) = header {
                response.headers_mut().insert(REQUEST_ID_HEADER, header);
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Endpoint;
    use crate::types::{request_body, ResponseExt};
    use http::{Request as HttpRequest, StatusCode};
    use uuid::Uuid;

    struct Ok200;

    impl Endpoint for Ok200 {
        fn call<'a>(&'a self, ctx: &'a mut RequestContext, _request: Request) -> BoxFuture<'a, Response> {
            let seen = ctx.correlation_id().to_string();
            Box::pin(async move { Response::error(StatusCode::OK, &seen) })
        }
    }

    fn create_test_request() -> Request {
        HttpRequest::builder()
            .uri("/ingest")
            .body(request_body(""))
            .unwrap()
    }

    fn create_request_with_id(request_id: &str) -> Request {
        HttpRequest::builder()
            .uri("/ingest")
            .header(REQUEST_ID_HEADER, request_id)
            .body(request_body(""))
            .unwrap()
    }

    fn header_id(response: &Response) -> String {
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("x-request-id should be set")
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_generates_request_id_when_missing() {
        let mut ctx = RequestContext::new();
        let response = RequestIdMiddleware::new()
            .process(&mut ctx, create_test_request(), Next::endpoint(&Ok200))
            .await;

        let header = header_id(&response);
        assert_eq!(Uuid::parse_str(&header).unwrap().get_version_num(), 7);
        assert_eq!(ctx.correlation_id().as_str(), header);
    }

    #[tokio::test]
    async fn test_uses_incoming_id() {
        let mut ctx = RequestContext::new();
        let response = RequestIdMiddleware::new()
            .process(
                &mut ctx,
                create_request_with_id("edge-42"),
                Next::endpoint(&Ok200),
            )
            .await;

        assert_eq!(header_id(&response), "edge-42");
        assert_eq!(ctx.correlation_id().as_str(), "edge-42");
    }

    #[tokio::test]
    async fn test_endpoint_sees_correlation_id() {
        use http_body_util::BodyExt;

        let mut ctx = RequestContext::new();
        let response = RequestIdMiddleware::new()
            .process(
                &mut ctx,
                create_request_with_id("edge-7"),
                Next::endpoint(&Ok200),
            )
            .await;

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"edge-7");
    }

    #[tokio::test]
    async fn test_replaces_unusable_incoming_id() {
        let too_long = "x".repeat(CorrelationId::MAX_LEN + 1);
        let mut ctx = RequestContext::new();
        let response = RequestIdMiddleware::new()
            .process(
                &mut ctx,
                create_request_with_id(&too_long),
                Next::endpoint(&Ok200),
            )
            .await;

        let header = header_id(&response);
        assert_ne!(header, too_long);
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(RequestIdMiddleware::new().name(), "request_id");
    }
}
