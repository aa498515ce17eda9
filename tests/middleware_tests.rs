mod common;

use brrtmvc::binder::InputSlot;
use brrtmvc::dispatcher::{Dispatcher, DispatcherBuilder};
use brrtmvc::error::{ErrorKind, HandlerError};
use brrtmvc::middleware::{
    AuditEvent, AuditMiddleware, AuthorizationMiddleware, MemoryAuditSink, MetricsMiddleware,
};
use brrtmvc::response::Response;
use brrtmvc::router::{AccessPolicy, HandlerDescriptor};
use brrtmvc::session::MemorySessionStore;
use brrtmvc::RequestContext;
use common::recording::{call_log, BeforeMode, Calls, LateMode, RecordingMiddleware};
use http::Method;
use std::sync::Arc;

fn ok_route(builder: DispatcherBuilder, calls: &Calls) -> DispatcherBuilder {
    let calls = calls.clone();
    builder.register(
        HandlerDescriptor::new("Product", "show"),
        vec![InputSlot::integer("id")],
        move |_ctx, args| {
            calls.hit();
            Ok(Response::payload(serde_json::json!({ "id": args.int("id") })))
        },
    )
}

fn failing_route(builder: DispatcherBuilder, calls: &Calls) -> DispatcherBuilder {
    let calls = calls.clone();
    builder.register(
        HandlerDescriptor::new("Product", "delete").method(Method::POST),
        vec![],
        move |_ctx, _args| {
            calls.hit();
            Err(HandlerError::business(409, "product is referenced by orders"))
        },
    )
}

#[test]
fn test_hooks_run_in_registration_order() {
    let log = call_log();
    let calls = Calls::default();
    let d = ok_route(
        Dispatcher::builder()
            .add_middleware(RecordingMiddleware::new("first", &log))
            .add_middleware(RecordingMiddleware::new("second", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::GET, "/Product/show?id=4");
    assert_eq!(d.handle(&mut ctx).status, 200);
    assert_eq!(calls.count(), 1);
    assert_eq!(
        *log.lock(),
        vec!["first:before", "second:before", "first:after", "second:after"]
    );
}

#[test]
fn test_handler_failure_runs_error_hooks_once_and_no_after_hooks() {
    let log = call_log();
    let calls = Calls::default();
    let d = failing_route(
        Dispatcher::builder()
            .add_middleware(RecordingMiddleware::new("first", &log))
            .add_middleware(RecordingMiddleware::new("second", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::POST, "/Product/delete");
    let wire = d.handle(&mut ctx);
    assert_eq!(wire.status, 409);
    assert_eq!(calls.count(), 1);
    assert_eq!(
        *log.lock(),
        vec![
            "first:before",
            "second:before",
            "first:error:Business",
            "second:error:Business"
        ]
    );
    assert_eq!(ctx.error().map(|e| e.status()), Some(409));
}

#[test]
fn test_binding_failure_goes_through_error_hooks() {
    let log = call_log();
    let calls = Calls::default();
    let d = ok_route(
        Dispatcher::builder().add_middleware(RecordingMiddleware::new("only", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::GET, "/Product/show?id=seven");
    let wire = d.handle(&mut ctx);
    assert_eq!(wire.status, 400);
    assert_eq!(calls.count(), 0);
    assert_eq!(*log.lock(), vec!["only:before", "only:error:BadRequest"]);
}

#[test]
fn test_respond_short_circuit_skips_handler_and_later_hooks() {
    let log = call_log();
    let calls = Calls::default();
    let d = ok_route(
        Dispatcher::builder()
            .add_middleware(RecordingMiddleware::with_mode("gate", &log, BeforeMode::Respond))
            .add_middleware(RecordingMiddleware::new("later", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::GET, "/Product/show");
    let wire = d.handle(&mut ctx);
    assert_eq!(wire.status, 200);
    assert_eq!(wire.body, b"short-circuited");
    assert_eq!(calls.count(), 0);
    assert_eq!(*log.lock(), vec!["gate:before"]);
}

#[test]
fn test_reject_short_circuit_runs_error_hooks() {
    let log = call_log();
    let calls = Calls::default();
    let d = ok_route(
        Dispatcher::builder()
            .add_middleware(RecordingMiddleware::new("first", &log))
            .add_middleware(RecordingMiddleware::with_mode("gate", &log, BeforeMode::Reject))
            .add_middleware(RecordingMiddleware::new("third", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::GET, "/Product/show");
    assert_eq!(d.handle(&mut ctx).status, 401);
    assert_eq!(calls.count(), 0);
    assert_eq!(
        *log.lock(),
        vec![
            "first:before",
            "gate:before",
            "first:error:Unauthorized",
            "gate:error:Unauthorized",
            "third:error:Unauthorized"
        ]
    );
}

#[test]
fn test_failing_before_hook_does_not_stop_siblings() {
    for mode in [BeforeMode::Fail, BeforeMode::Panic] {
        let log = call_log();
        let calls = Calls::default();
        let d = ok_route(
            Dispatcher::builder()
                .add_middleware(RecordingMiddleware::with_mode("broken", &log, mode))
                .add_middleware(RecordingMiddleware::new("next", &log)),
            &calls,
        )
        .build();

        let mut ctx = RequestContext::new(Method::GET, "/Product/show");
        assert_eq!(d.handle(&mut ctx).status, 500);
        assert_eq!(calls.count(), 0);
        assert_eq!(
            *log.lock(),
            vec![
                "broken:before",
                "next:before",
                "broken:error:Internal",
                "next:error:Internal"
            ]
        );
    }
}

#[test]
fn test_failing_error_hook_does_not_stop_siblings() {
    for late in [LateMode::Fail, LateMode::Panic] {
        let log = call_log();
        let calls = Calls::default();
        let d = failing_route(
            Dispatcher::builder()
                .add_middleware(RecordingMiddleware::failing_late("broken", &log, late))
                .add_middleware(RecordingMiddleware::new("next", &log)),
            &calls,
        )
        .build();

        let mut ctx = RequestContext::new(Method::POST, "/Product/delete");
        let wire = d.handle(&mut ctx);
        assert_eq!(wire.status, 409);
        assert_eq!(wire.get_header("content-type"), Some("application/json"));
        assert_eq!(calls.count(), 1);
        assert_eq!(
            *log.lock(),
            vec![
                "broken:before",
                "next:before",
                "broken:error:Business",
                "next:error:Business"
            ]
        );
        assert_eq!(ctx.error().map(|e| e.kind()), Some(ErrorKind::Business));
    }
}

#[test]
fn test_failing_after_hook_does_not_stop_siblings() {
    for late in [LateMode::Fail, LateMode::Panic] {
        let log = call_log();
        let calls = Calls::default();
        let d = ok_route(
            Dispatcher::builder()
                .add_middleware(RecordingMiddleware::failing_late("broken", &log, late))
                .add_middleware(RecordingMiddleware::new("next", &log)),
            &calls,
        )
        .build();

        let mut ctx = RequestContext::new(Method::GET, "/Product/show?id=8");
        let wire = d.handle(&mut ctx);
        assert_eq!(wire.status, 200);
        assert_eq!(wire.body, br#"{"id":8}"#);
        assert_eq!(
            *log.lock(),
            vec!["broken:before", "next:before", "broken:after", "next:after"]
        );
        assert!(ctx.error().is_none());
    }
}

#[test]
fn test_not_found_runs_no_hooks() {
    let log = call_log();
    let calls = Calls::default();
    let d = ok_route(
        Dispatcher::builder().add_middleware(RecordingMiddleware::new("only", &log)),
        &calls,
    )
    .build();

    let mut ctx = RequestContext::new(Method::GET, "/Product/list");
    assert_eq!(d.handle(&mut ctx).status, 404);
    assert_eq!(calls.count(), 0);
    assert!(log.lock().is_empty());
}

fn secured(sessions: Arc<MemorySessionStore>, sink: Arc<MemoryAuditSink>, calls: &Calls) -> Dispatcher {
    let create_calls = calls.clone();
    let profile_calls = calls.clone();
    Dispatcher::builder()
        .add_middleware(Arc::new(AuditMiddleware::new(sink)))
        .add_middleware(Arc::new(AuthorizationMiddleware::new(sessions, "SESSIONID")))
        .register(
            HandlerDescriptor::new("User", "create")
                .method(Method::POST)
                .access(AccessPolicy::roles(["admin"])),
            vec![],
            move |_ctx, _args| {
                create_calls.hit();
                Ok(Response::created(serde_json::json!({ "created": true })))
            },
        )
        .register(
            HandlerDescriptor::new("User", "profile").access(AccessPolicy::Authenticated),
            vec![],
            move |ctx, _args| {
                profile_calls.hit();
                let sid = ctx.session().map(|s| s.id().to_string());
                Ok(Response::payload(serde_json::json!({ "session": sid })))
            },
        )
        .register(HandlerDescriptor::new("User", "about"), vec![], |_ctx, _args| {
            Ok(Response::text("public"))
        })
        .build()
}

#[test]
fn test_role_mismatch_is_unauthorized_and_audited_once() {
    let sessions = Arc::new(MemorySessionStore::new());
    sessions.login("s-manager", "manager");
    let sink = Arc::new(MemoryAuditSink::new());
    let calls = Calls::default();
    let d = secured(Arc::clone(&sessions), Arc::clone(&sink), &calls);

    let mut ctx = RequestContext::new(Method::POST, "/User/create")
        .with_header("Cookie", "theme=dark; SESSIONID=s-manager");
    let wire = d.handle(&mut ctx);
    assert_eq!(wire.status, 401);
    assert_eq!(calls.count(), 0);

    let unauthorized: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|r| {
            matches!(
                r.event,
                AuditEvent::Failed {
                    kind: ErrorKind::Unauthorized,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(unauthorized.len(), 1);
    assert_eq!(unauthorized[0].operation.as_deref(), Some("create"));
}

#[test]
fn test_matching_role_invokes_handler() {
    let sessions = Arc::new(MemorySessionStore::new());
    sessions.login("s-admin", "auditor, admin");
    let sink = Arc::new(MemoryAuditSink::new());
    let calls = Calls::default();
    let d = secured(Arc::clone(&sessions), Arc::clone(&sink), &calls);

    let mut ctx =
        RequestContext::new(Method::POST, "/User/create").with_header("Cookie", "SESSIONID=s-admin");
    assert_eq!(d.handle(&mut ctx).status, 201);
    assert_eq!(calls.count(), 1);

    let events: Vec<_> = sink.records().into_iter().map(|r| r.event).collect();
    assert_eq!(
        events,
        vec![AuditEvent::Started, AuditEvent::Completed { status: 201 }]
    );
}

#[test]
fn test_wildcard_policy_invokes_exactly_once_when_authenticated() {
    let sessions = Arc::new(MemorySessionStore::new());
    sessions.login("s-any", "guest");
    let calls = Calls::default();
    let d = secured(
        Arc::clone(&sessions),
        Arc::new(MemoryAuditSink::new()),
        &calls,
    );

    let mut ctx =
        RequestContext::new(Method::GET, "/User/profile").with_header("Cookie", "SESSIONID=s-any");
    let wire = d.handle(&mut ctx);
    assert_eq!(wire.status, 200);
    assert_eq!(calls.count(), 1);
    let body: serde_json::Value = serde_json::from_slice(&wire.body).unwrap();
    assert_eq!(body["session"], "s-any");

    let mut anonymous = RequestContext::new(Method::GET, "/User/profile");
    assert_eq!(d.handle(&mut anonymous).status, 401);
    let mut unknown =
        RequestContext::new(Method::GET, "/User/profile").with_header("Cookie", "SESSIONID=nope");
    assert_eq!(d.handle(&mut unknown).status, 401);
    assert_eq!(calls.count(), 1);
}

#[test]
fn test_public_operation_needs_no_session() {
    let calls = Calls::default();
    let d = secured(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryAuditSink::new()),
        &calls,
    );
    let mut ctx = RequestContext::new(Method::GET, "/User/about");
    assert_eq!(d.handle(&mut ctx).status, 200);
}

#[test]
fn test_metrics_middleware_counts_outcomes() {
    let metrics = Arc::new(MetricsMiddleware::new());
    let calls = Calls::default();
    let builder = Dispatcher::builder().add_middleware(Arc::<MetricsMiddleware>::clone(&metrics));
    let d = failing_route(ok_route(builder, &calls), &calls).build();

    let mut ok = RequestContext::new(Method::GET, "/Product/show?id=1");
    d.handle(&mut ok);
    let mut failed = RequestContext::new(Method::POST, "/Product/delete");
    d.handle(&mut failed);
    let mut missing = RequestContext::new(Method::GET, "/Product/nothing");
    d.handle(&mut missing);

    assert_eq!(metrics.request_count(), 2);
    assert_eq!(metrics.completed_count(), 1);
    assert_eq!(metrics.failed_count(), 1);
    assert_eq!(metrics.rejected_count(), 0);
    let text = metrics.render_prometheus();
    assert!(text.contains("brrtmvc_requests_total 2"));
}
