//! # Server Module
//!
//! may_minihttp transport adapter. [`AppService`] reads each request into a
//! [`RequestContext`](crate::context::RequestContext), hands it to the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) and writes the rendered
//! [`WireResponse`](crate::response::WireResponse) back.
//!
//! Each connection runs on its own `may` coroutine; the dispatch pipeline is
//! synchronous within it.
//!
//! Header lines handed to may_minihttp must be `'static`, so the writer
//! interns distinct lines in a bounded process-wide table. `content-type`,
//! `content-disposition` and `location` bypass the bound and are always
//! written; a response whose required header is malformed goes out as a 500.
//! `x-request-id` is
//! unique per request and is therefore not echoed on the wire; it is logged
//! and present on the `WireResponse` returned by
//! [`Dispatcher::handle`](crate::dispatcher::Dispatcher::handle).

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_request, RawRequest};
pub use response::write_wire_response;
pub use service::{health_response, metrics_response, AppService};
