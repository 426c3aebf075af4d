// crates/ut-stats-server/tests/http_router.rs
// ============================================================================
// Module: HTTP Router Tests
// Description: End-to-end tests over a served ut-stats router.
// Purpose: Validate routes, peer extraction, and transport-level body limits.
// Dependencies: ut-stats-server, hyper, hyper-util, http-body-util, tokio
// ============================================================================
//! ## Overview
//! Serves the real router on a loopback listener and talks to it over HTTP/1.1,
//! so method bindings, `ConnectInfo` extraction, and the buffered body limit
//! are exercised together with dispatch and audit.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::Method;
use hyper::Request;
use hyper::StatusCode;
use hyper::header::CONTENT_TYPE;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use ut_stats_core::AggregateOptions;
use ut_stats_core::FixedClock;
use ut_stats_core::InMemoryTelemetryStore;
use ut_stats_core::SharedClock;
use ut_stats_core::SharedTelemetryStore;
use ut_stats_core::StaticIgnoreList;
use ut_stats_core::Timestamp;
use ut_stats_server::AuditSink;
use ut_stats_server::BodyLimits;
use ut_stats_server::RequestAuditEvent;
use ut_stats_server::RequestOutcome;
use ut_stats_server::ServerState;
use ut_stats_server::build_router;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const INSTALL: &str = "8d5c7f2a-3b1e-4c6d-9a0f-1e2d3c4b5a69";
const CRASH: &str = "c0ffee00-0000-4000-8000-000000000001";

const LIMITS: BodyLimits = BodyLimits {
    max_body_bytes: 512,
    max_log_bytes: 2048,
};

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<RequestAuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }
}

struct Reply {
    status: StatusCode,
    content_type: String,
    body: Value,
}

async fn serve_router() -> (SocketAddr, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let audit: Arc<dyn AuditSink> = sink.clone();
    let now = Timestamp::parse_rfc3339("2026-10-17T12:00:00Z").unwrap();
    let state = ServerState::new(
        SharedTelemetryStore::from_store(InMemoryTelemetryStore::new()),
        SharedClock::from_clock(FixedClock::new(now)),
        StaticIgnoreList::default(),
        AggregateOptions::default(),
        audit,
        LIMITS,
    );
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await;
    });
    (addr, sink)
}

async fn send(addr: SocketAddr, method: Method, path: &str, body: Vec<u8>) -> Reply {
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await.expect("handshake");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, addr.to_string())
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("request");
    let response = sender.send_request(request).await.expect("send request");
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.into_body().collect().await.expect("response body").to_bytes();
    let body = serde_json::from_slice(&bytes).expect("json response body");
    Reply {
        status,
        content_type,
        body,
    }
}

fn post_json(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn report_then_stats_over_http() {
    let (addr, sink) = serve_router().await;

    let body = post_json(&json!({"id": INSTALL, "version": "1.0", "launchmode": "tray"}));
    let reply = send(addr, Method::POST, "/ut-stats", body).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type, "application/json");
    assert_eq!(reply.body, json!({"status": "ok"}));

    let stats = send(addr, Method::GET, "/ut-stats/stats", Vec::new()).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["total"]["idcount"], json!(1));
    assert_eq!(stats.body["active"]["launchcount"], json!({"normal": 0, "tray": 1}));

    let launch = send(addr, Method::GET, "/ut-stats/stats/launch", Vec::new()).await;
    assert_eq!(launch.body, json!({"total": 1, "normal": 0, "tray": 1}));

    let requests = sink.requests.lock().unwrap();
    assert_eq!(requests[0].route, "/ut-stats");
    assert_eq!(requests[0].peer_ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(requests[0].install_id.as_deref(), Some(INSTALL));
}

#[tokio::test]
async fn stats_routes_reject_post() {
    let (addr, _sink) = serve_router().await;
    let stream = TcpStream::connect(addr).await.expect("connect");
    let (mut sender, connection) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await.expect("handshake");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/ut-stats/stats")
        .header(HOST, addr.to_string())
        .body(Full::new(Bytes::new()))
        .expect("request");
    let response = sender.send_request(request).await.expect("send request");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn body_over_transport_limit_gets_json_413_and_audit() {
    let (addr, sink) = serve_router().await;
    let log = "x".repeat(LIMITS.max_log_bytes + 100);
    let body = post_json(&json!({"crashid": CRASH, "log": log}));
    let sent = body.len();

    let reply = send(addr, Method::POST, "/ut-stats/crash/log", body).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply.content_type, "application/json");
    assert_eq!(reply.body["error"]["kind"], json!("payload_too_large"));

    let requests = sink.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].route, "/ut-stats/crash/log");
    assert_eq!(requests[0].status, 413);
    assert_eq!(requests[0].outcome, RequestOutcome::Rejected);
    assert_eq!(requests[0].error_kind, Some("payload_too_large"));
    assert_eq!(requests[0].request_bytes, sent);
    assert_eq!(requests[0].peer_ip.as_deref(), Some("127.0.0.1"));
}

#[tokio::test]
async fn body_between_route_and_transport_limits_gets_json_413() {
    let (addr, sink) = serve_router().await;
    let padding = "a".repeat(LIMITS.max_body_bytes + 100);
    let body = post_json(&json!({"id": INSTALL, "action": "open", "padding": padding}));
    assert!(body.len() < LIMITS.max_log_bytes);

    let reply = send(addr, Method::POST, "/ut-stats/usage", body).await;
    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply.body["error"]["kind"], json!("payload_too_large"));
    assert_eq!(sink.requests.lock().unwrap()[0].status, 413);
}
