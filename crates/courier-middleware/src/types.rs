//! Common types used throughout the middleware pipeline.
//!
//! Request bodies are streamed (the payload guard reads them incrementally),
//! so both directions use boxed bodies rather than `Full<Bytes>`.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Serialize;
use std::convert::Infallible;

pub use courier_core::BoxError;

/// The request body type: any byte stream whose errors can be boxed.
pub type RequestBody = UnsyncBoxBody<Bytes, BoxError>;

/// The response body type.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// The HTTP request type used in the middleware pipeline.
pub type Request = http::Request<RequestBody>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<ResponseBody>;

/// Creates a response body holding `chunk`.
pub fn full(chunk: impl Into<Bytes>) -> ResponseBody {
    Full::new(chunk.into()).boxed_unsync()
}

/// Creates an empty response body.
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().boxed_unsync()
}

/// Creates a request body holding `chunk`.
pub fn request_body(chunk: impl Into<Bytes>) -> RequestBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Extension trait for building responses.
pub trait ResponseExt {
    /// Creates a plain-text response with the given status code and message.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a JSON response from a serializable value.
    ///
    /// Falls back to a plain-text `500` if the value cannot be encoded.
    fn json<T: Serialize>(status: StatusCode, value: &T) -> Response;
}

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        let mut response = http::Response::new(full(message.to_owned()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn json<T: Serialize>(status: StatusCode, value: &T) -> Response {
        let Ok(body) = serde_json::to_vec(value) else {
            return Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        };

        let mut response = http::Response::new(full(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
