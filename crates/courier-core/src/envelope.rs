//! Job identifiers and the job envelope handed to the broker.

use crate::error::IngestError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

/// A server-generated job identifier (random UUID v4).
///
/// Never supplied by the caller. Every accepted request gets a fresh one,
/// even when the payload bytes are identical to a previous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new random job id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The immutable wrapper placed around a client payload.
///
/// The payload is kept as the raw JSON text of the request body: it is checked
/// for syntactic validity and otherwise never parsed into application types.
/// Fields are private and there are no setters; the envelope is consumed by
/// [`JobEnvelope::into_wire`], so it can only be serialized once.
///
/// Wire format:
///
/// ```json
/// {"job_id":"<uuid>","payload":<raw json>,"received_at":"<RFC 3339 UTC>"}
/// ```
#[derive(Debug, Serialize)]
pub struct JobEnvelope {
    job_id: JobId,
    payload: Box<RawValue>,
    received_at: DateTime<Utc>,
}

impl JobEnvelope {
    /// Validates `body` as JSON and wraps it.
    ///
    /// Any JSON value is accepted (object, array, scalar). An empty body is not
    /// a JSON document and fails like any other malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidPayload`] carrying the parse error.
    pub fn build(job_id: JobId, body: &[u8]) -> Result<Self, IngestError> {
        let payload: Box<RawValue> =
            serde_json::from_slice(body).map_err(IngestError::InvalidPayload)?;

        Ok(Self {
            job_id,
            payload,
            received_at: Utc::now(),
        })
    }

    /// Returns the job id.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the raw payload JSON text.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.payload.get()
    }

    /// Returns the instant the envelope was built.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Serializes the envelope into its wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Serialization`] if encoding fails.
    pub fn into_wire(self) -> Result<Bytes, IngestError> {
        serde_json::to_vec(&self)
            .map(Bytes::from)
            .map_err(IngestError::Serialization)
    }
}
