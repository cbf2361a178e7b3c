//! Pipeline stages.
//!
//! 1. [`request_id`] - Extract/generate the correlation id
//! 2. [`access_log`] - Time the request and write its access record

pub mod access_log;
pub mod request_id;

pub use access_log::{
    AccessLogMiddleware, AccessLogSink, AccessRecord, MemoryAccessLog, Outcome, TracingAccessLog,
};
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
