//! HTTP request parsing.

use bytes::Bytes;
use http::Method;
use std::collections::HashMap;

/// Parsed HTTP request.
///
/// Produced by [`Request::parse`], which never fails: malformed input yields
/// a request with empty or partial fields that routing rejects later.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Method token as received.
    method: String,
    /// Path without the query string.
    path: String,
    /// Raw query string (after `?`), if any.
    query: Option<String>,
    /// Headers, keys as received. Last occurrence wins.
    headers: HashMap<String, String>,
    /// Everything after the blank line.
    body: Bytes,
    /// Parameters bound by the router.
    params: HashMap<String, String>,
}

impl Request {
    /// Parse raw request bytes.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let (head, body) = match find_header_end(data) {
            Some((head_end, body_start)) => (&data[..head_end], &data[body_start..]),
            None => (data, &[][..]),
        };

        let head = String::from_utf8_lossy(head);
        let mut lines = head.split('\n');

        let mut request = Self {
            body: Bytes::copy_from_slice(body),
            ..Self::default()
        };

        if let Some(start_line) = lines.next() {
            let mut parts = start_line.split_whitespace();
            request.method = parts.next().unwrap_or_default().to_string();
            let target = parts.next().unwrap_or_default();
            match target.split_once('?') {
                Some((path, query)) => {
                    request.path = path.to_string();
                    request.query = Some(query.to_string());
                },
                None => request.path = target.to_string(),
            }
        }

        for line in lines {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value);
            if name.is_empty() || value.is_empty() {
                continue;
            }
            request.headers.insert(name.to_string(), value.to_string());
        }

        request
    }

    /// Create a new request builder.
    #[must_use]
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Method token as received (may be empty for garbage input).
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The method as an [`http::Method`], if it is a valid token.
    #[must_use]
    pub fn http_method(&self) -> Option<Method> {
        Method::from_bytes(self.method.as_bytes()).ok()
    }

    /// Get the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the query string. Never used for routing.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Get a header value by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Get a header value, matching the name case-insensitively.
    #[must_use]
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get all headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Get the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get a path parameter bound by the router.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Get all path parameters.
    #[must_use]
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

/// Locate the blank line. Returns (end of header block, start of body).
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    data.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

/// Builder for constructing requests in tests and benchmarks.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Create a new builder for `GET /`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request: Request {
                method: "GET".to_string(),
                path: "/".to_string(),
                ..Request::default()
            },
        }
    }

    /// Set the method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.request.method = method.into();
        self
    }

    /// Set the path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.request.path = path.into();
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Build the request.
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }
}
