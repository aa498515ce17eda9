use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::response::Response;

/// Outcome of a before-hook.
#[derive(Debug)]
pub enum Before {
    /// Run the next hook, then the handler.
    Continue,
    /// Write this response. Neither the handler nor any later hook runs.
    Respond(Response),
    /// Fail the request. The error goes through every `on_error` hook.
    Reject(DispatchError),
}

/// Cross-cutting hooks run around every resolved handler.
///
/// All three hooks default to doing nothing. Errors and panics raised by a
/// hook are caught by the chain and logged; they never skip sibling hooks.
pub trait Middleware: Send + Sync {
    /// Name used in log events.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn before_action(&self, _ctx: &mut RequestContext) -> anyhow::Result<Before> {
        Ok(Before::Continue)
    }

    fn after_action(&self, _ctx: &RequestContext, _res: &mut Response) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_error(&self, _ctx: &RequestContext, _err: &DispatchError) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one hook, folding a panic into an error.
fn guarded<T>(hook: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    match catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

/// Ordered middleware list. Registration order is execution order for every
/// phase.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.middlewares.iter().map(|m| m.name()))
            .finish()
    }
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        debug!(middleware = %middleware.name(), position = self.middlewares.len(), "Middleware registered");
        self.middlewares.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run before-hooks in order until one short-circuits.
    ///
    /// A failing hook is logged and the rest still run; the request is then
    /// rejected as internal. The first failure outranks any later
    /// short-circuit.
    pub fn run_before(&self, ctx: &mut RequestContext) -> Before {
        let mut failure: Option<DispatchError> = None;
        for mw in &self.middlewares {
            match guarded(|| mw.before_action(ctx)) {
                Ok(Before::Continue) => {}
                Ok(Before::Respond(resp)) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        middleware = %mw.name(),
                        status = resp.status(),
                        "Before-hook short-circuited with a response"
                    );
                    return match failure {
                        Some(err) => Before::Reject(err),
                        None => Before::Respond(resp),
                    };
                }
                Ok(Before::Reject(err)) => {
                    debug!(
                        request_id = %ctx.request_id(),
                        middleware = %mw.name(),
                        error = %err,
                        "Before-hook rejected the request"
                    );
                    return Before::Reject(failure.unwrap_or(err));
                }
                Err(e) => {
                    error!(
                        request_id = %ctx.request_id(),
                        middleware = %mw.name(),
                        error = %e,
                        "Before-hook failed"
                    );
                    failure.get_or_insert_with(|| {
                        DispatchError::internal(format!("before-hook {} failed: {e}", mw.name()))
                    });
                }
            }
        }
        failure.map_or(Before::Continue, Before::Reject)
    }

    /// Run every after-hook in order. Failures are logged and ignored.
    pub fn run_after(&self, ctx: &RequestContext, res: &mut Response) {
        for mw in &self.middlewares {
            if let Err(e) = guarded(|| mw.after_action(ctx, res)) {
                warn!(
                    request_id = %ctx.request_id(),
                    middleware = %mw.name(),
                    error = %e,
                    "After-hook failed"
                );
            }
        }
    }

    /// Run every `on_error` hook once, in order, with the same failure.
    pub fn run_on_error(&self, ctx: &RequestContext, err: &DispatchError) {
        for mw in &self.middlewares {
            if let Err(e) = guarded(|| mw.on_error(ctx, err)) {
                warn!(
                    request_id = %ctx.request_id(),
                    middleware = %mw.name(),
                    error = %e,
                    "Error hook failed"
                );
            }
        }
    }
}
