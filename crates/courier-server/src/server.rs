//! HTTP server.
//!
//! Built on hyper's HTTP/1 connection driver and Tokio. Each accepted
//! connection runs in its own task; requests to [`INGEST_PATH`] flow through
//! the middleware [`Pipeline`] into the [`IngestHandler`], everything else is
//! answered `404` directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier_server::{IngestConfig, IngestHandler, Server, ServerConfig};
//! use courier_middleware::TracingAccessLog;
//! use std::sync::Arc;
//!
//! let handler = IngestHandler::new(broker, IngestConfig::default());
//! let server = Server::new(ServerConfig::default(), handler, Arc::new(TracingAccessLog::default()));
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use courier_core::{BoxError, Broker, RequestContext};
use courier_middleware::{AccessLogSink, Pipeline, Response, ResponseExt};
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::IngestHandler;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The only routed path.
pub const INGEST_PATH: &str = "/ingest";

/// The Courier HTTP server.
pub struct Server<B> {
    config: ServerConfig,
    pipeline: Pipeline,
    handler: IngestHandler<B>,
}

impl<B: Broker> Server<B> {
    /// Creates a server that writes access records to `access_log`.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        handler: IngestHandler<B>,
        access_log: Arc<dyn AccessLogSink>,
    ) -> Self {
        Self {
            config,
            pipeline: Pipeline::new(access_log),
            handler,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be
    /// bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be
    /// bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|source| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                source,
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// triggers, then waits up to the shutdown timeout for open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, path = INGEST_PATH, "Server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(remote_addr = %remote_addr, error = %e, "Connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            connections = tracker.active_connections(),
            "Waiting for open connections"
        );

        tokio::select! {
            () = tracker.drained() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    connections = tracker.active_connections(),
                    "Shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);

        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, remote_addr).await) }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => return result,
            () = shutdown.recv() => {
                tracing::debug!(remote_addr = %remote_addr, "Closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }

        // Let the in-flight exchange, if any, finish.
        conn.await
    }

    async fn handle_request(
        &self,
        request: http::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Response {
        if request.uri().path() != INGEST_PATH {
            return Response::error(StatusCode::NOT_FOUND, "Not Found");
        }

        let request = request.map(|body| body.map_err(BoxError::from).boxed_unsync());
        let mut ctx = RequestContext::new().with_remote_addr(remote_addr);

        self.pipeline.execute(&mut ctx, request, &self.handler).await
    }
}

impl<B> std::fmt::Debug for Server<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .field("handler", &self.handler)
            .finish()
    }
}
