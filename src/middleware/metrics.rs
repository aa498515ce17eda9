use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::{Before, Middleware};
use crate::context::RequestContext;
use crate::error::{DispatchError, ErrorKind};
use crate::response::Response;

/// Middleware for collecting Prometheus-compatible dispatch metrics
///
/// All counters use atomic operations for thread-safe updates without locks.
///
/// Metrics collected:
/// - Requests that reached the before-hooks
/// - Completed and failed requests
/// - Requests rejected by authorization
/// - Average latency of finished requests
/// - Coroutine stack size
/// - Top-level requests (`/health`, `/metrics`) that bypass dispatch
#[derive(Default)]
pub struct MetricsMiddleware {
    request_count: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    rejected: AtomicUsize,
    total_latency_ns: AtomicU64,
    stack_size: AtomicUsize,
    top_level_requests: AtomicUsize,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Requests failed with `Unauthorized`. Also counted as failed.
    pub fn rejected_count(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Mean processing time over completed and failed requests.
    pub fn average_latency(&self) -> Duration {
        let finished = (self.completed_count() + self.failed_count()) as u64;
        if finished == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / finished)
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size.load(Ordering::Relaxed)
    }

    /// Count an infrastructure request served outside the dispatcher.
    pub fn inc_top_level_request(&self) {
        self.top_level_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn top_level_request_count(&self) -> usize {
        self.top_level_requests.load(Ordering::Relaxed)
    }

    fn finish(&self, latency: Duration) {
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        let size = if may::coroutine::is_coroutine() {
            may::coroutine::current().stack_size()
        } else {
            may::config().get_stack_size()
        };
        self.stack_size.store(size, Ordering::Relaxed);
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::with_capacity(1024);
        let counters = [
            (
                "brrtmvc_requests_total",
                "Requests that entered the middleware chain",
                self.request_count(),
            ),
            (
                "brrtmvc_requests_completed_total",
                "Requests whose handler completed normally",
                self.completed_count(),
            ),
            (
                "brrtmvc_requests_failed_total",
                "Requests that ended on the error path",
                self.failed_count(),
            ),
            (
                "brrtmvc_requests_rejected_total",
                "Requests rejected as unauthorized",
                self.rejected_count(),
            ),
            (
                "brrtmvc_top_level_requests_total",
                "Requests served outside the dispatcher",
                self.top_level_request_count(),
            ),
        ];
        for (name, help, value) in counters {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n"
            ));
        }
        out.push_str(&format!(
            "# HELP brrtmvc_request_latency_seconds Average request latency\n\
             # TYPE brrtmvc_request_latency_seconds gauge\n\
             brrtmvc_request_latency_seconds {:.6}\n",
            self.average_latency().as_secs_f64()
        ));
        out.push_str(&format!(
            "# HELP brrtmvc_coroutine_stack_bytes Coroutine stack size\n\
             # TYPE brrtmvc_coroutine_stack_bytes gauge\n\
             brrtmvc_coroutine_stack_bytes {}\n",
            self.stack_size()
        ));
        out
    }
}

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &str {
        "metrics"
    }

    fn before_action(&self, _ctx: &mut RequestContext) -> anyhow::Result<Before> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Ok(Before::Continue)
    }

    fn after_action(&self, ctx: &RequestContext, _res: &mut Response) -> anyhow::Result<()> {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.finish(ctx.elapsed());
        Ok(())
    }

    fn on_error(&self, ctx: &RequestContext, err: &DispatchError) -> anyhow::Result<()> {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if err.kind() == ErrorKind::Unauthorized {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        self.finish(ctx.elapsed());
        Ok(())
    }
}
