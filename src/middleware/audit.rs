use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{info, warn};

use super::{Before, Middleware};
use crate::context::RequestContext;
use crate::error::{DispatchError, ErrorKind};
use crate::ids::RequestId;
use crate::response::Response;

/// Lifecycle point an audit record describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    Started,
    Completed { status: u16 },
    Failed {
        kind: ErrorKind,
        status: u16,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub request_id: RequestId,
    pub method: String,
    pub path: String,
    pub handler_group: Option<String>,
    pub operation: Option<String>,
    pub timestamp: SystemTime,
    #[serde(flatten)]
    pub event: AuditEvent,
}

impl AuditRecord {
    fn new(ctx: &RequestContext, event: AuditEvent) -> Self {
        let descriptor = ctx.descriptor();
        Self {
            request_id: ctx.request_id(),
            method: ctx.method().to_string(),
            path: ctx.path().to_string(),
            handler_group: descriptor.map(|d| d.group().to_string()),
            operation: descriptor.map(|d| d.operation().to_string()),
            timestamp: SystemTime::now(),
            event,
        }
    }
}

/// Destination for audit records, typically a data-access collaborator.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Writes audit records as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let event = serde_json::to_string(&record.event)?;
        info!(
            target: "brrtmvc::audit",
            request_id = %record.request_id,
            method = %record.method,
            path = %record.path,
            handler_group = record.handler_group.as_deref().unwrap_or("-"),
            operation = record.operation.as_deref().unwrap_or("-"),
            event = %event,
            "Audit"
        );
        Ok(())
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Records request start, completion and failure.
///
/// A sink that fails is logged and otherwise ignored; auditing never fails a
/// request.
pub struct AuditMiddleware {
    sink: Arc<dyn AuditSink>,
}

impl Default for AuditMiddleware {
    fn default() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }
}

impl AuditMiddleware {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    fn write(&self, ctx: &RequestContext, event: AuditEvent) {
        let record = AuditRecord::new(ctx, event);
        if let Err(e) = self.sink.record(&record) {
            warn!(request_id = %ctx.request_id(), error = %e, "Audit sink write failed");
        }
    }
}

impl Middleware for AuditMiddleware {
    fn name(&self) -> &str {
        "audit"
    }

    fn before_action(&self, ctx: &mut RequestContext) -> anyhow::Result<Before> {
        self.write(ctx, AuditEvent::Started);
        Ok(Before::Continue)
    }

    fn after_action(&self, ctx: &RequestContext, res: &mut Response) -> anyhow::Result<()> {
        self.write(
            ctx,
            AuditEvent::Completed {
                status: res.status(),
            },
        );
        Ok(())
    }

    fn on_error(&self, ctx: &RequestContext, err: &DispatchError) -> anyhow::Result<()> {
        self.write(
            ctx,
            AuditEvent::Failed {
                kind: err.kind(),
                status: err.status(),
                message: err.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    struct BrokenSink;
    impl AuditSink for BrokenSink {
        fn record(&self, _record: &AuditRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_records_lifecycle() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mw = AuditMiddleware::new(sink.clone());
        let mut ctx = RequestContext::new(Method::GET, "/Home/index");
        mw.before_action(&mut ctx).unwrap();
        mw.on_error(&ctx, &DispatchError::unauthorized("no")).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, AuditEvent::Started);
        assert!(matches!(
            records[1].event,
            AuditEvent::Failed { kind: ErrorKind::Unauthorized, status: 401, .. }
        ));
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let mw = AuditMiddleware::new(Arc::new(BrokenSink));
        let mut ctx = RequestContext::new(Method::GET, "/Home/index");
        assert!(matches!(mw.before_action(&mut ctx).unwrap(), Before::Continue));
        let mut res = Response::text("ok");
        assert!(mw.after_action(&ctx, &mut res).is_ok());
    }

    #[test]
    fn test_record_serializes_flat() {
        let ctx = RequestContext::new(Method::POST, "/Order/create");
        let record = AuditRecord::new(&ctx, AuditEvent::Completed { status: 201 });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], "completed");
        assert_eq!(value["status"], 201);
        assert_eq!(value["method"], "POST");
    }
}
