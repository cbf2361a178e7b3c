//! Fixed-order middleware pipeline.
//!
//! Every ingestion request flows through the same stages, in this order:
//!
//! 1. **Request ID** - extract or generate the correlation id, echo it back
//! 2. **Access Log** - time the request and write one access record
//!
//! The request-id stage runs first so that the access record carries the
//! final correlation id. The order cannot be changed.

use crate::middleware::{Endpoint, Middleware, Next};
use crate::stages::access_log::{AccessLogMiddleware, AccessLogSink};
use crate::stages::request_id::RequestIdMiddleware;
use crate::types::{Request, Response};
use courier_core::RequestContext;
use std::sync::Arc;

/// A type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Correlation id extraction/generation.
    RequestId,
    /// Access record emission.
    AccessLog,
}

impl Stage {
    /// Returns all stages in execution order.
    #[must_use]
    pub const fn all() -> [Self; 2] {
        [Self::RequestId, Self::AccessLog]
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequestId => "request_id",
            Self::AccessLog => "access_log",
        }
    }
}

/// The fixed-order middleware pipeline.
///
/// # Example
///
/// ```ignore
/// use courier_middleware::{Pipeline, TracingAccessLog};
///
/// let pipeline = Pipeline::new(Arc::new(TracingAccessLog::default()));
/// let response = pipeline.execute(&mut ctx, request, &handler).await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates the pipeline, writing access records to `access_log`.
    #[must_use]
    pub fn new(access_log: Arc<dyn AccessLogSink>) -> Self {
        Self {
            stages: vec![
                Arc::new(RequestIdMiddleware::new()),
                Arc::new(AccessLogMiddleware::new(access_log)),
            ],
        }
    }

    /// Runs `request` through every stage and then `endpoint`.
    pub async fn execute(
        &self,
        ctx: &mut RequestContext,
        request: Request,
        endpoint: &dyn Endpoint,
    ) -> Response {
        self.build_chain(endpoint).run(ctx, request).await
    }

    /// Builds the chain from back to front.
    fn build_chain<'a>(&'a self, endpoint: &'a dyn Endpoint) -> Next<'a> {
        let mut next = Next::endpoint(endpoint);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::access_log::MemoryAccessLog;

    #[test]
    fn test_stage_order_matches_stage_enum() {
        let pipeline = Pipeline::new(Arc::new(MemoryAccessLog::new()));
        let expected: Vec<_> = Stage::all().iter().map(|stage| stage.name()).collect();
        assert_eq!(pipeline.stage_names(), expected);
    }
}
