//! # Dispatcher Module
//!
//! The Dispatch Core: drives one request through the pipeline and guarantees
//! a response on every path.
//!
//! ## State machine
//!
//! ```text
//! Resolving -> BeforeHooks -> Binding -> Invoking -> AfterHooksOrError -> Writing -> Done
//! ```
//!
//! - Resolution failure goes straight to `Writing` with a `NotFound` response.
//!   No hook runs.
//! - A before-hook [`Respond`](crate::middleware::Before::Respond) goes to
//!   `Writing` with that response.
//! - A before-hook [`Reject`](crate::middleware::Before::Reject), a binding
//!   failure or a handler failure runs every `on_error` hook, then writes the
//!   error response: `400` for binding, the carried status for business
//!   failures, `500` for anything else (including panics).
//! - Normal completion runs every `after_action` hook, then writes the
//!   handler's response.
//!
//! ## Registry
//!
//! [`DispatcherBuilder`] collects handler registrations and middleware at
//! startup. [`DispatcherBuilder::build`] freezes them; the resulting
//! [`Dispatcher`] is shared read-only between request coroutines (usually in an
//! `Arc`) and needs no locking.
//!
//! ## Example
//!
//! ```rust
//! use brrtmvc::binder::InputSlot;
//! use brrtmvc::context::RequestContext;
//! use brrtmvc::dispatcher::Dispatcher;
//! use brrtmvc::response::Response;
//! use brrtmvc::router::HandlerDescriptor;
//! use http::Method;
//!
//! let dispatcher = Dispatcher::builder()
//!     .register(
//!         HandlerDescriptor::new("Product", "show"),
//!         vec![InputSlot::integer("id")],
//!         |_ctx, args| Ok(Response::payload(serde_json::json!({ "id": args.int("id") }))),
//!     )
//!     .build();
//!
//! let mut ctx = RequestContext::new(Method::GET, "/Product/show?id=7");
//! let wire = dispatcher.handle(&mut ctx);
//! assert_eq!(wire.status, 200);
//! assert_eq!(wire.body, br#"{"id":7}"#);
//! ```

mod core;

pub use core::{Dispatcher, DispatcherBuilder, Handler};
