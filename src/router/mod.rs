//! # Router Module
//!
//! Maps an incoming `/{handler-group}/{operation}` path plus HTTP verb to a
//! registered handler routine and its declared metadata.
//!
//! ## Overview
//!
//! Registration happens once at startup through
//! [`DispatcherBuilder::register`](crate::dispatcher::DispatcherBuilder::register),
//! which attaches a [`HandlerDescriptor`] (verb, access policy, response shape,
//! free-form attributes) to each callable. After the dispatcher is built the
//! registry is frozen and only read.
//!
//! ## Matching rules
//!
//! - The path must have exactly two segments; anything else is `NotFound`.
//! - Operations answer the declared verb only, `GET` when undeclared.
//! - A verb mismatch is reported as `NotFound`, identical to a missing route.
//!
//! ## Example
//!
//! ```rust
//! use brrtmvc::dispatcher::Dispatcher;
//! use brrtmvc::router::HandlerDescriptor;
//! use brrtmvc::response::Response;
//! use http::Method;
//!
//! let dispatcher = Dispatcher::builder()
//!     .register(HandlerDescriptor::new("Product", "list"), vec![], |_ctx, _args| {
//!         Ok(Response::payload(serde_json::json!([])))
//!     })
//!     .build();
//!
//! assert!(dispatcher.router().resolve(&Method::GET, "/Product/list").is_ok());
//! assert!(dispatcher.router().resolve(&Method::POST, "/Product/list").is_err());
//! ```

mod core;
mod descriptor;

pub use core::{split_route_path, RouteEntry, Router};
pub use descriptor::{AccessPolicy, HandlerDescriptor, ResponseShape};
