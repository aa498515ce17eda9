use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;
use serde_json::json;
use tracing::{debug, error, field, info, info_span, warn};

use crate::binder::{Binder, BoundArgs, InputSlot};
use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::{AppConfig, ErrorPagesConfig, TemplateConfig, UploadLimits};
use crate::context::{DispatchState, RequestContext};
use crate::error::{DispatchError, ErrorKind, HandlerResult};
use crate::ids::REQUEST_ID_HEADER;
use crate::middleware::{panic_message, Before, Middleware, MiddlewareChain};
use crate::response::{Response, ResponseRenderer, WireResponse};
use crate::router::{HandlerDescriptor, ResponseShape, RouteEntry, Router};
use crate::template::{MiniJinjaRenderer, TemplateRenderer};

/// A routed handler routine.
///
/// Any `Fn(&RequestContext, BoundArgs) -> HandlerResult` closure is a handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, ctx: &RequestContext, args: BoundArgs) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&RequestContext, BoundArgs) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, ctx: &RequestContext, args: BoundArgs) -> HandlerResult {
        self(ctx, args)
    }
}

/// Collects registrations and collaborators, then freezes them into a
/// [`Dispatcher`].
pub struct DispatcherBuilder {
    router: Router,
    chain: MiddlewareChain,
    limits: UploadLimits,
    error_pages: ErrorPagesConfig,
    templates: Arc<dyn TemplateRenderer>,
    codec: Arc<dyn PayloadCodec>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            router: Router::new(),
            chain: MiddlewareChain::new(),
            limits: UploadLimits::default(),
            error_pages: ErrorPagesConfig::default(),
            templates: Arc::new(MiniJinjaRenderer::new(TemplateConfig::default().dir)),
            codec: Arc::new(JsonCodec),
        }
    }
}

impl DispatcherBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder seeded with the error pages, upload limits and template
    /// directory of `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            limits: config.uploads,
            error_pages: config.error_pages.clone(),
            templates: Arc::new(MiniJinjaRenderer::new(config.templates.dir.clone())),
            ..Self::default()
        }
    }

    /// Register a closure for the operation described by `descriptor`.
    #[must_use]
    pub fn register<F>(self, descriptor: HandlerDescriptor, slots: Vec<InputSlot>, handler: F) -> Self
    where
        F: Fn(&RequestContext, BoundArgs) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_handler(descriptor, slots, Arc::new(handler))
    }

    /// Register a shared handler object.
    #[must_use]
    pub fn register_handler(
        mut self,
        descriptor: HandlerDescriptor,
        slots: Vec<InputSlot>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.router.insert(RouteEntry {
            descriptor: Arc::new(descriptor),
            slots: slots.into(),
            handler,
        });
        self
    }

    /// Append a middleware. Registration order is execution order.
    #[must_use]
    pub fn add_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.chain.push(middleware);
        self
    }

    #[must_use]
    pub fn templates(mut self, templates: Arc<dyn TemplateRenderer>) -> Self {
        self.templates = templates;
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn upload_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn error_pages(mut self, pages: ErrorPagesConfig) -> Self {
        self.error_pages = pages;
        self
    }

    /// Freeze the registry and middleware chain.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        info!(
            routes = self.router.len(),
            middlewares = self.chain.len(),
            "Dispatcher built"
        );
        Dispatcher {
            router: self.router,
            chain: self.chain,
            binder: Binder::new(self.limits, Arc::clone(&self.codec)),
            renderer: ResponseRenderer::new(self.templates, self.codec),
            error_pages: self.error_pages,
        }
    }
}

/// Immutable dispatch pipeline shared by every request.
///
/// Drives one [`RequestContext`] through resolve, before-hooks, binding,
/// invocation and after/error hooks, and always produces a response.
pub struct Dispatcher {
    router: Router,
    chain: MiddlewareChain,
    binder: Binder,
    renderer: ResponseRenderer,
    error_pages: ErrorPagesConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("chain", &self.chain)
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[must_use]
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.chain
    }

    #[must_use]
    pub fn upload_limits(&self) -> &UploadLimits {
        self.binder.limits()
    }

    /// Run the pipeline and return the response to write.
    ///
    /// Leaves `ctx` in [`DispatchState::Writing`].
    pub fn dispatch(&self, ctx: &mut RequestContext) -> Response {
        let span = info_span!(
            "dispatch",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            handler_group = field::Empty,
            operation = field::Empty,
        );
        let _entered = span.enter();

        ctx.set_state(DispatchState::Resolving);
        let entry = match self.router.resolve(ctx.method(), ctx.path()) {
            Ok(entry) => entry,
            Err(err) => {
                info!(error = %err, "Route not found");
                ctx.fail(err.clone());
                ctx.set_state(DispatchState::Writing);
                return self.error_response(ctx, &err);
            }
        };
        span.record("handler_group", entry.descriptor.group());
        span.record("operation", entry.descriptor.operation());
        ctx.set_descriptor(Arc::clone(&entry.descriptor));

        ctx.set_state(DispatchState::BeforeHooks);
        match self.chain.run_before(ctx) {
            Before::Continue => {}
            Before::Respond(response) => {
                debug!(status = response.status(), "Short-circuit response");
                ctx.set_state(DispatchState::Writing);
                return response;
            }
            Before::Reject(err) => return self.fail(ctx, err),
        }

        ctx.set_state(DispatchState::Binding);
        let args = match self.binder.bind(ctx, &entry.slots) {
            Ok(args) => args,
            Err(err) => return self.fail(ctx, err.into()),
        };
        debug!(bound = args.len(), "Parameters bound");

        ctx.set_state(DispatchState::Invoking);
        let outcome = catch_unwind(AssertUnwindSafe(|| entry.handler.handle(ctx, args)));
        let result = match outcome {
            Ok(result) => result.map_err(DispatchError::from),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic_message = %message, "Handler panicked");
                Err(DispatchError::internal(format!("handler panicked: {message}")))
            }
        };

        match result {
            Ok(mut response) => {
                ctx.set_state(DispatchState::AfterHooksOrError);
                self.chain.run_after(ctx, &mut response);
                ctx.set_state(DispatchState::Writing);
                debug!(status = response.status(), "Handler completed");
                response
            }
            Err(err) => self.fail(ctx, err),
        }
    }

    /// Error branch: record the failure, run every `on_error` hook, build the
    /// error response.
    fn fail(&self, ctx: &mut RequestContext, err: DispatchError) -> Response {
        ctx.set_state(DispatchState::AfterHooksOrError);
        match err.kind() {
            ErrorKind::Internal => error!(error = %err, "Request failed"),
            _ => warn!(error = %err, kind = ?err.kind(), "Request failed"),
        }
        ctx.fail(err.clone());
        self.chain.run_on_error(ctx, &err);
        ctx.set_state(DispatchState::Writing);
        self.error_response(ctx, &err)
    }

    /// Response for `err`, shaped by the resolved handler's declared response
    /// shape. Without a resolved handler an HTML `Accept` selects a page.
    #[must_use]
    pub fn error_response(&self, ctx: &RequestContext, err: &DispatchError) -> Response {
        let status = err.status();
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        let shape = ctx.descriptor().map_or_else(
            || {
                if ctx.accepts_html() {
                    ResponseShape::Page
                } else {
                    ResponseShape::Data
                }
            },
            HandlerDescriptor::response_shape,
        );

        match shape {
            ResponseShape::Page => {
                let view = match err.kind() {
                    ErrorKind::NotFound => &self.error_pages.not_found,
                    ErrorKind::Unauthorized => &self.error_pages.unauthorized,
                    _ => &self.error_pages.internal_error,
                };
                Response::view(view.as_str())
                    .in_group(self.error_pages.group.as_str())
                    .with_status(status)
                    .with_param("status", status)
                    .with_param("error", reason)
                    .with_param("message", err.public_message())
                    .with_param("path", ctx.path())
            }
            ResponseShape::Data => Response::payload(json!({
                "error": reason,
                "message": err.public_message(),
                "status": status,
            }))
            .with_status(status),
        }
    }

    /// Dispatch and render to wire form, tagging the response with the
    /// request id. Leaves `ctx` in [`DispatchState::Done`].
    pub fn handle(&self, ctx: &mut RequestContext) -> WireResponse {
        let response = self.dispatch(ctx);
        let status = response.status();
        let (group, operation) = ctx
            .descriptor()
            .map_or((None, None), |d| (Some(d.group()), Some(d.operation())));

        let mut wire = match self.renderer.render(response, group, operation) {
            Ok(wire) => wire,
            Err(e) => {
                error!(request_id = %ctx.request_id(), error = %e, "Response rendering failed");
                let status = if status >= 400 { status } else { 500 };
                WireResponse::fallback(status, "Internal Server Error")
            }
        };
        wire.set_header(REQUEST_ID_HEADER, ctx.request_id().to_string());
        ctx.set_state(DispatchState::Done);
        info!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            status = wire.status,
            latency_ms = ctx.elapsed().as_millis() as u64,
            "Request complete"
        );
        wire
    }
}
