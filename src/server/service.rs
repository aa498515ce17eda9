use super::request::{parse_request, RawRequest};
use super::response::write_wire_response;
use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use crate::middleware::MetricsMiddleware;
use crate::response::WireResponse;
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::warn;

/// may_minihttp service that feeds every request to a [`Dispatcher`].
///
/// `GET /health` and `GET /metrics` are answered here without dispatch.
#[derive(Clone)]
pub struct AppService {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Option<Arc<MetricsMiddleware>>,
}

impl AppService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            metrics: None,
        }
    }

    /// Expose `metrics` at `/metrics`. Register the same instance as a
    /// middleware for it to count dispatched requests.
    pub fn set_metrics_middleware(&mut self, metrics: Arc<MetricsMiddleware>) {
        self.metrics = Some(metrics);
    }

    /// Produce the wire response for an already-read request.
    pub fn respond(&self, raw: RawRequest) -> WireResponse {
        let is_get = raw.method == "GET";
        match raw.path() {
            "/health" if is_get => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_top_level_request();
                }
                return health_response();
            }
            "/metrics" if is_get => {
                return match &self.metrics {
                    Some(metrics) => {
                        metrics.inc_top_level_request();
                        metrics_response(metrics)
                    }
                    None => WireResponse::fallback(404, "Not Found"),
                };
            }
            _ => {}
        }

        let method = match Method::from_bytes(raw.method.as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                warn!(method = %raw.method, "Rejecting request with invalid method");
                return WireResponse::fallback(400, "Bad Request");
            }
        };
        let mut ctx = RequestContext::from_parts(method, &raw.target, raw.headers, raw.body);
        self.dispatcher.handle(&mut ctx)
    }
}

/// Basic health check response: `{ "status": "ok" }`.
pub fn health_response() -> WireResponse {
    WireResponse {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: br#"{"status":"ok"}"#.to_vec(),
    }
}

/// Prometheus text exposition of `metrics`.
pub fn metrics_response(metrics: &MetricsMiddleware) -> WireResponse {
    WireResponse {
        status: 200,
        headers: vec![(
            "content-type".to_string(),
            "text/plain; version=0.0.4".to_string(),
        )],
        body: metrics.render_prometheus().into_bytes(),
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let max_body = self.dispatcher.upload_limits().max_request_bytes;
        let wire = match parse_request(req, max_body) {
            Ok(raw) => self.respond(raw),
            Err(e) => {
                warn!(error = %e, "Failed to read request");
                WireResponse::fallback(400, "Bad Request")
            }
        };
        write_wire_response(res, wire);
        Ok(())
    }
}
