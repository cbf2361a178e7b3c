//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all pipeline stages
//! implement and the [`Endpoint`] trait for the handler at the end of the
//! chain. Middleware runs before the endpoint and sees its response after.
//!
//! # Example
//!
//! ```ignore
//! use courier_middleware::{BoxFuture, Middleware, Next, Request, Response};
//! use courier_core::RequestContext;
//!
//! struct Noop;
//!
//! impl Middleware for Noop {
//!     fn name(&self) -> &'static str {
//!         "noop"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move { next.run(ctx, request).await })
//!     }
//! }
//! ```

use crate::types::{Request, Response};
use courier_core::RequestContext;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that returns a response.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core middleware trait.
///
/// Middleware receives the mutable request context, the request, and a
/// [`Next`] to invoke the rest of the chain.
///
/// # Invariants
///
/// - Middleware MUST call `next.run()` exactly once (unless short-circuiting)
/// - Middleware MUST NOT alter the response body bytes
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware stage.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// The handler at the end of a middleware chain.
pub trait Endpoint: Send + Sync {
    /// Handles the request, producing a response.
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, request: Request) -> BoxFuture<'a, Response>;
}

/// Callback to invoke the next middleware in the chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once. A stage that
/// does not call it short-circuits the pipeline with its own response.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain
    Endpoint(&'a dyn Endpoint),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke `middleware`, then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the endpoint.
    pub fn endpoint(endpoint: &'a dyn Endpoint) -> Self {
        Self {
            inner: NextInner::Endpoint(endpoint),
        }
    }

    /// Invokes the next middleware or the endpoint.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Endpoint(endpoint) => endpoint.call(ctx, request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{empty, ResponseExt};
    use http::{Request as HttpRequest, StatusCode};
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        visits: std::sync::Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Response> {
            Box::pin(async move {
                self.visits.lock().push(self.name);
                next.run(ctx, request).await
            })
        }
    }

    struct Ok200;

    impl Endpoint for Ok200 {
        fn call<'a>(&'a self, _ctx: &'a mut RequestContext, _request: Request) -> BoxFuture<'a, Response> {
            Box::pin(async { Response::error(StatusCode::OK, "OK") })
        }
    }

    fn request() -> Request {
        HttpRequest::builder()
            .uri("/test")
            .body(crate::types::request_body(""))
            .unwrap()
    }

    #[tokio::test]
    async fn test_next_endpoint() {
        let mut ctx = RequestContext::new();
        let response = Next::endpoint(&Ok200).run(&mut ctx, request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_chain_order() {
        let visits = std::sync::Arc::new(Mutex::new(Vec::new()));
        let first = Recorder {
            name: "first",
            visits: visits.clone(),
        };
        let second = Recorder {
            name: "second",
            visits: visits.clone(),
        };

        let next = Next::new(&first, Next::new(&second, Next::endpoint(&Ok200)));
        let mut ctx = RequestContext::new();
        let response = next.run(&mut ctx, request()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*visits.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_short_circuit() {
        struct Deny;

        impl Middleware for Deny {
            fn name(&self) -> &'static str {
                "deny"
            }

            fn process<'a>(
                &'a self,
                _ctx: &'a mut RequestContext,
                _request: Request,
                _next: Next<'a>,
            ) -> BoxFuture<'a, Response> {
                Box::pin(async {
                    let mut response = Response::new(empty());
                    *response.status_mut() = StatusCode::FORBIDDEN;
                    response
                })
            }
        }

        let mut ctx = RequestContext::new();
        let response = Next::new(&Deny, Next::endpoint(&Ok200))
            .run(&mut ctx, request())
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
