//! HTTP request routing.

use super::error::HttpError;
use super::request::Request;
use super::response::Response;
use http::{Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Request handler.
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    /// Original pattern string.
    pattern: String,
    /// Pattern segments.
    segments: Vec<PathSegment>,
}

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    /// Literal segment (exact match).
    Literal(String),
    /// Named parameter (:name).
    Param(String),
}

impl PathPattern {
    /// Compile a path pattern.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|part| match part.strip_prefix(':') {
                Some(name) => PathSegment::Param(name.to_string()),
                None => PathSegment::Literal(part.to_string()),
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern binds any parameter.
    #[must_use]
    pub fn is_parametrized(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, PathSegment::Param(_)))
    }

    /// Match a path, returning the bound parameters.
    ///
    /// Literal patterns match by string equality. Parametrized patterns
    /// compare segment by segment with equal counts; empty segments
    /// (leading, trailing or doubled slashes) are ignored on both sides.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        if !self.is_parametrized() {
            return (self.pattern == path).then(HashMap::new);
        }

        let parts: Vec<&str> = split_segments(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                PathSegment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                },
                PathSegment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                },
            }
        }
        Some(params)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A registered route.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: Handler,
}

impl Route {
    /// Get the method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the path pattern.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Invoke the handler.
    #[must_use]
    pub fn handle(&self, request: &Request) -> Response {
        (self.handler)(request)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Result of a successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    /// The matched route.
    pub route: &'a Route,
    /// Parameters bound from the path.
    pub params: HashMap<String, String>,
}

/// HTTP request router.
///
/// Literal patterns always win over parametrized ones; within each group the
/// first registered match wins.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` and `pattern`.
    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.routes.push(Route {
            method,
            pattern: PathPattern::compile(pattern),
            handler: Arc::new(handler),
        });
    }

    /// Builder-style [`Router::add_route`].
    #[must_use]
    pub fn route<F>(mut self, method: Method, pattern: &str, handler: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.add_route(method, pattern, handler);
        self
    }

    /// Find the route for `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Result<RouteMatch<'_>, HttpError> {
        let candidates = move || self.routes.iter().filter(move |r| &r.method == method);

        let exact = candidates()
            .filter(|r| !r.pattern.is_parametrized())
            .find_map(|r| r.pattern.match_path(path).map(|params| (r, params)));

        let found = exact.or_else(|| {
            candidates()
                .filter(|r| r.pattern.is_parametrized())
                .find_map(|r| r.pattern.match_path(path).map(|params| (r, params)))
        });

        match found {
            Some((route, params)) => {
                debug!(
                    method = %method,
                    path = %path,
                    pattern = %route.pattern.as_str(),
                    "Route matched"
                );
                Ok(RouteMatch { route, params })
            },
            None => Err(HttpError::NoRoute {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// Route a request and run its handler.
    ///
    /// Unmatched requests (including unparseable methods) get
    /// `404 {"error":"Route not found"}`.
    #[must_use]
    pub fn dispatch(&self, mut request: Request) -> Response {
        let Some(method) = request.http_method() else {
            debug!(method = %request.method(), "Unparseable method");
            return not_found();
        };

        match self.find(&method, request.path()) {
            Ok(RouteMatch { route, params }) => {
                request.set_params(params);
                route.handle(&request)
            },
            Err(e) => {
                debug!(error = %e, "Route miss");
                not_found()
            },
        }
    }

    /// Get the number of routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

fn not_found() -> Response {
    Response::error(StatusCode::NOT_FOUND, "Route not found")
}
