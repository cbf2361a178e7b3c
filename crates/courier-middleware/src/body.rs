//! Observing response body.

use crate::stages::access_log::{AccessLogger, Outcome};
use crate::types::ResponseBody;
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Response body wrapper that counts the bytes handed to the connection.
///
/// Frames pass through untouched. When the inner body reaches its end the
/// access record is written as completed; if the wrapper is dropped first it is
/// written as aborted with the bytes delivered so far.
pub struct ObservedBody {
    inner: ResponseBody,
    bytes: u64,
    logger: AccessLogger,
}

impl ObservedBody {
    pub(crate) fn new(inner: ResponseBody, logger: AccessLogger) -> Self {
        Self {
            inner,
            bytes: 0,
            logger,
        }
    }

    /// Returns the number of data bytes polled so far.
    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes
    }
}

impl Body for ObservedBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes += data.len() as u64;
                }
                if this.inner.is_end_stream() {
                    this.logger.finish(Outcome::Completed, this.bytes);
                }
            }
            Poll::Ready(None) => this.logger.finish(Outcome::Completed, this.bytes),
            Poll::Ready(Some(Err(never))) => match *never {},
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        // An empty body may be dropped without ever being polled, and a HEAD
        // response body is never sent at all.
        let outcome = if self.inner.is_end_stream() || self.logger.is_head() {
            Outcome::Completed
        } else {
            Outcome::Aborted
        };
        self.logger.finish(outcome, self.bytes);
    }
}

impl std::fmt::Debug for ObservedBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservedBody")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}
