//! # Courier Middleware
//!
//! The request pipeline wrapped around the ingestion handler.
//!
//! ```text
//! Request → RequestId → AccessLog → Endpoint
//!                                      ↓
//! Response ← RequestId ← AccessLog ←───┘
//! ```
//!
//! | Stage | Middleware | Purpose                                            |
//! |-------|------------|----------------------------------------------------|
//! | 1     | Request ID | Extract/generate `X-Request-ID`, echo it back      |
//! | 2     | Access Log | Time the request, count response bytes, log it     |
//!
//! ## Example
//!
//! ```
//! use courier_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages[0].name(), "request_id");
//! assert_eq!(stages[1].name(), "access_log");
//! ```

#![doc(html_root_url = "https://docs.rs/courier-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod body;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use body::ObservedBody;
pub use middleware::{BoxFuture, Endpoint, Middleware, Next};
pub use pipeline::{Pipeline, Stage};
pub use stages::{
    AccessLogSink, AccessRecord, MemoryAccessLog, Outcome, TracingAccessLog, REQUEST_ID_HEADER,
};
pub use types::{Request, RequestBody, Response, ResponseBody, ResponseExt};
