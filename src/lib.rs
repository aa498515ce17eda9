//! # brrtmvc
//!
//! **brrtmvc** is a coroutine-powered request-dispatch runtime. It sits between
//! an inbound HTTP connection and application handler routines. It resolves
//! `/{handler-group}/{operation}` to a registered handler, binds request data
//! onto the handler's declared inputs, runs an ordered middleware chain around
//! the call, and renders whatever the handler returned as a view, data
//! payload, file, raw content or redirect.
//!
//! ## Architecture
//!
//! - **[`response`]** - unified [`Response`](response::Response) model and wire rendering
//! - **[`binder`]** - query, form, multipart and structured-body parameter binding
//! - **[`router`]** - handler registry and route resolution
//! - **[`middleware`]** - before/after/error hook contract and built-ins
//! - **[`dispatcher`]** - the dispatch state machine
//! - **[`server`]** - `may_minihttp` transport adapter
//!
//! Collaborators sit behind traits: [`template::TemplateRenderer`],
//! [`codec::PayloadCodec`], [`session::SessionStore`] and
//! [`middleware::AuditSink`].
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as AppService<br/>(may_minihttp)
//!     participant Dispatcher
//!     participant Router
//!     participant Chain as MiddlewareChain
//!     participant Binder
//!     participant Handler
//!     participant Renderer as ResponseRenderer
//!
//!     Client->>Server: POST /Order/create
//!     Server->>Dispatcher: handle(ctx)
//!     Dispatcher->>Router: resolve(method, path)
//!     alt no route or verb mismatch
//!         Router-->>Dispatcher: NotFound
//!         Dispatcher-->>Server: 404 response
//!     end
//!     Dispatcher->>Chain: run_before(ctx)
//!     alt short-circuit
//!         Chain-->>Dispatcher: Respond / Reject
//!     end
//!     Dispatcher->>Binder: bind(ctx, slots)
//!     Dispatcher->>Handler: handle(ctx, args)
//!     alt failure
//!         Dispatcher->>Chain: run_on_error(ctx, err)
//!     else success
//!         Dispatcher->>Chain: run_after(ctx, response)
//!     end
//!     Dispatcher->>Renderer: render(response)
//!     Renderer-->>Server: WireResponse
//!     Server-->>Client: HTTP response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use brrtmvc::binder::InputSlot;
//! use brrtmvc::dispatcher::Dispatcher;
//! use brrtmvc::middleware::AuthorizationMiddleware;
//! use brrtmvc::response::Response;
//! use brrtmvc::router::{AccessPolicy, HandlerDescriptor};
//! use brrtmvc::session::MemorySessionStore;
//! use http::Method;
//!
//! let sessions = Arc::new(MemorySessionStore::new());
//! let dispatcher = Dispatcher::builder()
//!     .add_middleware(Arc::new(AuthorizationMiddleware::new(sessions, "SESSIONID")))
//!     .register(
//!         HandlerDescriptor::new("Order", "cancel")
//!             .method(Method::POST)
//!             .access(AccessPolicy::Authenticated),
//!         vec![InputSlot::integer("id")],
//!         |_ctx, args| Ok(Response::payload(serde_json::json!({ "cancelled": args.int("id") }))),
//!     )
//!     .build();
//!
//! let mut ctx = brrtmvc::context::RequestContext::new(Method::POST, "/Order/cancel?id=3");
//! assert_eq!(dispatcher.handle(&mut ctx).status, 401);
//! ```
//!
//! ## Runtime Considerations
//!
//! Each connection is served on a `may` coroutine. The dispatcher is immutable
//! once built and shared through an `Arc`, so the hot path takes no locks.
//! Coroutine stack size comes from `BRRTMVC_STACK_SIZE` (see
//! [`runtime_config`]).

pub mod binder;
pub mod cli;
pub mod codec;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod session;
pub mod template;

pub use config::AppConfig;
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, DispatcherBuilder, Handler};
pub use error::{BindingError, DispatchError, HandlerError, HandlerResult};
pub use response::Response;
