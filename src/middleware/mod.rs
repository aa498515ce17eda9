//! # Middleware Module
//!
//! Cross-cutting hooks run around every resolved handler.
//!
//! ## Contract
//!
//! Each [`Middleware`] has three hooks, all optional:
//!
//! - `before_action` runs in registration order before binding. Returning
//!   [`Before::Respond`] or [`Before::Reject`] stops the remaining before-hooks
//!   and skips the handler.
//! - `after_action` runs in registration order (not reversed) when the
//!   handler completed normally.
//! - `on_error` runs once per hook, in registration order, when the request
//!   failed. After-hooks never run on a failed request.
//!
//! A hook that errors or panics is logged by the [`MiddlewareChain`] and does
//! not stop its siblings from running.
//!
//! ## Built-ins
//!
//! - [`AuthorizationMiddleware`] enforces the handler's access policy.
//! - [`AuditMiddleware`] records start, completion and failure to an [`AuditSink`].
//! - [`MetricsMiddleware`] keeps Prometheus-style counters.

mod audit;
mod auth;
mod core;
mod metrics;

pub use audit::{AuditEvent, AuditMiddleware, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use auth::AuthorizationMiddleware;
pub use core::{Before, Middleware, MiddlewareChain};
pub(crate) use core::panic_message;
pub use metrics::MetricsMiddleware;
