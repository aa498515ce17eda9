mod common;

use brrtmvc::binder::InputSlot;
use brrtmvc::dispatcher::Dispatcher;
use brrtmvc::error::HandlerError;
use brrtmvc::middleware::{AuthorizationMiddleware, MetricsMiddleware};
use brrtmvc::response::Response;
use brrtmvc::router::{AccessPolicy, HandlerDescriptor};
use brrtmvc::server::{AppService, HttpServer, ServerHandle};
use brrtmvc::session::MemorySessionStore;
use common::http::{free_addr, parse_response_parts, send_request};
use http::Method;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

/// Server fixture, stopped on drop.
struct TestServer {
    handle: Option<ServerHandle>,
    addr: SocketAddr,
    metrics: Arc<MetricsMiddleware>,
}

impl TestServer {
    fn new() -> Self {
        may::config().set_stack_size(0x8000);

        let sessions = Arc::new(MemorySessionStore::new());
        sessions.login("s-admin", "admin");
        let metrics = Arc::new(MetricsMiddleware::new());

        let dispatcher = Dispatcher::builder()
            .add_middleware(Arc::<MetricsMiddleware>::clone(&metrics))
            .add_middleware(Arc::new(AuthorizationMiddleware::new(sessions, "SESSIONID")))
            .register(
                HandlerDescriptor::new("Product", "show"),
                vec![InputSlot::integer("id")],
                |_ctx, args| Ok(Response::payload(json!({ "id": args.int("id") }))),
            )
            .register(
                HandlerDescriptor::new("Order", "create")
                    .method(Method::POST)
                    .access(AccessPolicy::roles(["admin"])),
                vec![InputSlot::object::<Value>("order")],
                |_ctx, mut args| {
                    let order = args
                        .take_object::<Value>("order")
                        .ok_or_else(|| HandlerError::business(422, "order required"))?;
                    Ok(Response::created(order))
                },
            )
            .build();

        let mut service = AppService::new(Arc::new(dispatcher));
        service.set_metrics_middleware(Arc::clone(&metrics));

        let addr = free_addr();
        let handle = HttpServer(service).start(addr).unwrap();
        handle.wait_ready().unwrap();
        Self {
            handle: Some(handle),
            addr,
            metrics,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

fn json_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[test]
fn test_server_end_to_end() {
    let server = TestServer::new();

    let resp = send_request(
        &server.addr,
        "GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, content_type, body) = parse_response_parts(&resp);
    assert_eq!(status, 200);
    assert_eq!(content_type, "application/json");
    assert_eq!(json_body(&body), json!({ "status": "ok" }));

    let resp = send_request(
        &server.addr,
        "GET /Product/show?id=12 HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, _, body) = parse_response_parts(&resp);
    assert_eq!(status, 200);
    assert_eq!(json_body(&body), json!({ "id": 12 }));

    let resp = send_request(
        &server.addr,
        "GET /Product/list HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, _, body) = parse_response_parts(&resp);
    assert_eq!(status, 404);
    assert_eq!(json_body(&body)["status"], 404);

    let order = r#"{"qty":3}"#;
    let unauthorized = format!(
        "POST /Order/create HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{order}",
        order.len()
    );
    let (status, _, _) = parse_response_parts(&send_request(&server.addr, &unauthorized));
    assert_eq!(status, 401);

    let authorized = format!(
        "POST /Order/create HTTP/1.1\r\nHost: localhost\r\nCookie: SESSIONID=s-admin\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{order}",
        order.len()
    );
    let (status, content_type, body) =
        parse_response_parts(&send_request(&server.addr, &authorized));
    assert_eq!(status, 201);
    assert_eq!(content_type, "application/json");
    assert_eq!(json_body(&body), json!({ "qty": 3 }));

    let resp = send_request(
        &server.addr,
        "GET /metrics HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, content_type, body) = parse_response_parts(&resp);
    assert_eq!(status, 200);
    assert!(content_type.starts_with("text/plain"));
    assert!(body.contains("brrtmvc_requests_total 3"));
    assert!(body.contains("brrtmvc_requests_rejected_total 1"));
    assert_eq!(server.metrics.top_level_request_count(), 2);
}
