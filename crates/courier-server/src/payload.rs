//! Bounded request body reading.

use bytes::{Bytes, BytesMut};
use courier_core::IngestError;
use courier_middleware::RequestBody;
use http_body::Body;
use http_body_util::BodyExt;

/// Default request body limit: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Reads a request body into memory, refusing anything over `limit` bytes.
///
/// A body whose declared length already exceeds the limit is rejected without
/// reading it. Otherwise the body is read frame by frame and rejected as soon
/// as the running total passes the limit, so an oversized body is never fully
/// buffered.
#[derive(Debug, Clone, Copy)]
pub struct PayloadGuard {
    limit: usize,
}

impl PayloadGuard {
    /// Creates a guard allowing at most `limit` bytes.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Returns the byte limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Collects `body`.
    ///
    /// # Errors
    ///
    /// - [`IngestError::PayloadTooLarge`] if the body is longer than the limit
    /// - [`IngestError::BodyRead`] if the stream fails
    pub async fn read(&self, mut body: RequestBody) -> Result<Bytes, IngestError> {
        if body.size_hint().lower() > self.limit as u64 {
            return Err(self.too_large());
        }

        let mut buf = BytesMut::new();
        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|source| IngestError::BodyRead { source })?;
            // Trailers carry no payload.
            let Ok(data) = frame.into_data() else {
                continue;
            };
            if buf.len() + data.len() > self.limit {
                return Err(self.too_large());
            }
            buf.extend_from_slice(&data);
        }

        Ok(buf.freeze())
    }

    const fn too_large(&self) -> IngestError {
        IngestError::PayloadTooLarge { limit: self.limit }
    }
}

impl Default for PayloadGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}
