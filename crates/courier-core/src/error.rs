//! Error taxonomy of the ingestion pipeline.
//!
//! Every way a request can be rejected is a variant of [`IngestError`]. The
//! first four variants are client errors with a specific status; the last three
//! are server-side failures that all answer `500` so that broker details never
//! reach the caller. Each variant keeps a distinct [`IngestErrorKind`] for logs.
//!
//! | Variant | Status | Kind |
//! |---|---|---|
//! | `MethodNotAllowed` | 405 | `method_not_allowed` |
//! | `PayloadTooLarge` | 413 | `payload_too_large` |
//! | `BodyRead` | 400 | `body_read_error` |
//! | `InvalidPayload` | 400 | `invalid_payload` |
//! | `Serialization` | 500 | `serialization_error` |
//! | `BrokerSend` | 500 | `broker_send_error` |
//! | `EnqueueTimeout` | 500 | `enqueue_timeout` |

use crate::broker::BrokerError;
use http::{Method, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type used for body and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a request was rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request used a verb other than `POST`.
    #[error("method {method} not allowed")]
    MethodNotAllowed {
        /// The rejected method.
        method: Method,
    },

    /// The body exceeded the configured byte limit.
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },

    /// The body stream failed before completion.
    #[error("failed to read request body: {source}")]
    BodyRead {
        /// The underlying I/O or transport error.
        source: BoxError,
    },

    /// The body is not a syntactically valid JSON document.
    #[error("invalid JSON payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// The envelope could not be encoded for the broker.
    #[error("failed to serialize job envelope: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The broker reported a failure.
    #[error("broker send failed: {0}")]
    BrokerSend(#[from] BrokerError),

    /// The broker did not acknowledge within the enqueue timeout.
    #[error("enqueue did not complete within {timeout:?}")]
    EnqueueTimeout {
        /// The configured enqueue timeout.
        timeout: Duration,
    },
}

impl IngestError {
    /// Creates a body read error.
    pub fn body_read(source: impl Into<BoxError>) -> Self {
        Self::BodyRead {
            source: source.into(),
        }
    }

    /// Returns the log classification of this error.
    #[must_use]
    pub const fn kind(&self) -> IngestErrorKind {
        match self {
            Self::MethodNotAllowed { .. } => IngestErrorKind::MethodNotAllowed,
            Self::PayloadTooLarge { .. } => IngestErrorKind::PayloadTooLarge,
            Self::BodyRead { .. } => IngestErrorKind::BodyRead,
            Self::InvalidPayload(_) => IngestErrorKind::InvalidPayload,
            Self::Serialization(_) => IngestErrorKind::Serialization,
            Self::BrokerSend(_) => IngestErrorKind::BrokerSend,
            Self::EnqueueTimeout { .. } => IngestErrorKind::EnqueueTimeout,
        }
    }

    /// Returns the HTTP status code sent to the caller.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Returns the short message sent to the caller.
    ///
    /// Never includes the underlying cause.
    #[must_use]
    pub const fn client_message(&self) -> &'static str {
        self.kind().client_message()
    }
}

/// Stable classification of an [`IngestError`], used as the `error.kind`
/// log field and metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestErrorKind {
    /// Wrong HTTP verb.
    MethodNotAllowed,
    /// Body over the size limit.
    PayloadTooLarge,
    /// Body stream failed.
    #[serde(rename = "body_read_error")]
    BodyRead,
    /// Malformed JSON.
    InvalidPayload,
    /// Envelope encoding failed.
    #[serde(rename = "serialization_error")]
    Serialization,
    /// Broker rejected or failed the send.
    #[serde(rename = "broker_send_error")]
    BrokerSend,
    /// Broker did not acknowledge in time.
    EnqueueTimeout,
}

impl IngestErrorKind {
    /// Returns the classification as a static string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::PayloadTooLarge => "payload_too_large",
            Self::BodyRead => "body_read_error",
            Self::InvalidPayload => "invalid_payload",
            Self::Serialization => "serialization_error",
            Self::BrokerSend => "broker_send_error",
            Self::EnqueueTimeout => "enqueue_timeout",
        }
    }

    /// Returns the HTTP status code for this classification.
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead | Self::InvalidPayload => StatusCode::BAD_REQUEST,
            Self::Serialization | Self::BrokerSend | Self::EnqueueTimeout => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the client-facing message for this classification.
    #[must_use]
    pub const fn client_message(self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "Method not allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::BodyRead => "Bad Request",
            Self::InvalidPayload => "invalid JSON body",
            Self::Serialization | Self::BrokerSend | Self::EnqueueTimeout => {
                "Internal Server Error"
            }
        }
    }

    /// Returns `true` for failures on the server side of the boundary.
    #[must_use]
    pub const fn is_server_error(self) -> bool {
        matches!(
            self,
            Self::Serialization | Self::BrokerSend | Self::EnqueueTimeout
        )
    }
}

impl std::fmt::Display for IngestErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
