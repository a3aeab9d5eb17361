//! # HTTP Handler Module
//!
//! A small HTTP/1.1 server stack for the room management API. Every
//! connection carries exactly one request and is closed after the response.
//!
//! ## Pipeline
//!
//! - [`read_request`] accumulates socket bytes until a request is complete,
//!   the size cap is hit, the peer closes or a read times out
//! - [`Request::parse`] splits the bytes into method, path, headers and body
//!   without ever failing
//! - [`Router`] matches method and path, literal patterns before
//!   parametrized ones, and binds `:name` segments
//! - [`Response::serialize`] writes the status line, headers, a computed
//!   `Content-Length` and `Connection: close`
//!
//! ## Example
//!
//! ```rust,ignore
//! use livestream_signaling::modules::http_handler::{build_router, Request};
//!
//! let router = build_router(rooms, &limits);
//! let response = router.dispatch(Request::parse(&bytes));
//! ```

pub mod api;
pub mod error;
pub mod framer;
pub mod request;
pub mod response;
pub mod router;

pub use api::build_router;
pub use error::{HttpError, HttpResult};
pub use framer::read_request;
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder};
pub use router::{Handler, PathPattern, Route, RouteMatch, Router};
