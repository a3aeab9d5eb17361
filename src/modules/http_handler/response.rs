//! HTTP response building and serialization.

use bytes::{Bytes, BytesMut};
use http::StatusCode;
use serde::Serialize;
use tracing::error;

/// HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    status: StatusCode,
    /// Response headers, in insertion order.
    headers: Vec<(String, String)>,
    /// Response body.
    body: Bytes,
}

impl Response {
    /// Create a new response builder.
    #[must_use]
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    /// JSON response with the given status.
    ///
    /// Serialization failure degrades to a 500 with an error body.
    #[must_use]
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::builder()
                .status(status)
                .header("Content-Type", "application/json")
                .body(body)
                .build(),
            Err(e) => {
                error!(error = %e, "Failed to serialize response body");
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            },
        }
    }

    /// Error response with body `{"error":"<message>"}`.
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            error: &'a str,
        }

        let body = serde_json::to_vec(&ErrorBody { error: message })
            .unwrap_or_else(|_| br#"{"error":"Internal server error"}"#.to_vec());
        Self::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(body)
            .build()
    }

    /// Get the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get a header value (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get the response body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serialize the response to bytes.
    ///
    /// `Content-Length` is always computed from the body and
    /// `Connection: close` is always sent; caller-supplied values for either
    /// header are ignored.
    #[must_use]
    pub fn serialize(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(128 + self.body.len());

        buf.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                reason_phrase(self.status)
            )
            .as_bytes(),
        );

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            buf.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        buf.extend_from_slice(b"Connection: close\r\n\r\n");

        buf.extend_from_slice(&self.body);
        buf
    }
}

/// Reason phrase from the fixed table.
#[must_use]
pub fn reason_phrase(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Builder for HTTP responses.
#[derive(Debug)]
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ResponseBuilder {
    /// Create a new builder (200, no headers, empty body).
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Set the status code.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set a header, replacing any previous value with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the response.
    #[must_use]
    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
