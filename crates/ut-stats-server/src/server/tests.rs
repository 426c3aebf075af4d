// crates/ut-stats-server/src/server/tests.rs
// ============================================================================
// Module: ut-stats Server Unit Tests
// Description: Unit tests for report dispatch, stats egress, and audit events.
// Purpose: Validate HTTP-layer behavior with in-memory fixtures.
// Dependencies: ut-stats-server
// ============================================================================

//! ## Overview
//! Exercises report dispatch, status mapping, body limits, stats rendering,
//! and audit hooks against the in-memory store.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only dispatch assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::Value;
use serde_json::json;
use ut_stats_config::AuditConfig;
use ut_stats_config::AuditSinkType;
use ut_stats_core::ActionName;
use ut_stats_core::AggregateOptions;
use ut_stats_core::CheckName;
use ut_stats_core::CheckRecord;
use ut_stats_core::CheckStore;
use ut_stats_core::CheckValue;
use ut_stats_core::CrashId;
use ut_stats_core::CrashLog;
use ut_stats_core::CrashRecord;
use ut_stats_core::CrashStore;
use ut_stats_core::FixedClock;
use ut_stats_core::IdentityAttributes;
use ut_stats_core::IdentityRecord;
use ut_stats_core::IdentityStore;
use ut_stats_core::InMemoryTelemetryStore;
use ut_stats_core::InstallId;
use ut_stats_core::LaunchMode;
use ut_stats_core::SharedClock;
use ut_stats_core::SharedTelemetryStore;
use ut_stats_core::StaticIgnoreList;
use ut_stats_core::StoreError;
use ut_stats_core::TelemetryStore;
use ut_stats_core::Timestamp;
use ut_stats_core::UsageRecord;
use ut_stats_core::UsageStore;

use super::ApiResponse;
use super::BodyLimits;
use super::ReportRoute;
use super::ServerState;
use super::StatsRoute;
use super::dispatch_report;
use super::dispatch_stats;
use super::reject_body;
use super::run_report;
use super::run_stats;
use crate::audit::AuditSink;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestOutcome;
use crate::audit::SecurityAuditEvent;
use crate::audit::build_audit_sink;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const INSTALL: &str = "8d5c7f2a-3b1e-4c6d-9a0f-1e2d3c4b5a69";
const OTHER_INSTALL: &str = "00000000-0000-4000-8000-000000000002";
const CRASH: &str = "c0ffee00-0000-4000-8000-000000000001";

const LIMITS: BodyLimits = BodyLimits {
    max_body_bytes: 512,
    max_log_bytes: 2048,
};

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<RequestAuditEvent>>,
    security: Mutex<Vec<SecurityAuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &RequestAuditEvent) {
        self.requests.lock().unwrap().push(event.clone());
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.security.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    state: Arc<ServerState>,
    sink: Arc<RecordingSink>,
    store: SharedTelemetryStore,
}

fn now() -> Timestamp {
    Timestamp::parse_rfc3339("2026-10-17T12:00:00Z").unwrap()
}

fn fixture_with(store: SharedTelemetryStore, ignore: StaticIgnoreList) -> Fixture {
    let sink = Arc::new(RecordingSink::default());
    let audit: Arc<dyn AuditSink> = sink.clone();
    let state = ServerState::new(
        store.clone(),
        SharedClock::from_clock(FixedClock::new(now())),
        ignore,
        AggregateOptions::default(),
        audit,
        LIMITS,
    );
    Fixture {
        state: Arc::new(state),
        sink,
        store,
    }
}

fn fixture() -> Fixture {
    fixture_with(
        SharedTelemetryStore::from_store(InMemoryTelemetryStore::new()),
        StaticIgnoreList::default(),
    )
}

fn report(fixture: &Fixture, route: ReportRoute, body: &Value) -> ApiResponse {
    let bytes = serde_json::to_vec(body).unwrap();
    dispatch_report(&fixture.state, route, Some("127.0.0.1".to_string()), &bytes)
}

fn body_json(response: &ApiResponse) -> Value {
    serde_json::from_slice(&response.body).unwrap()
}

fn error_kind(response: &ApiResponse) -> String {
    body_json(response)["error"]["kind"].as_str().unwrap().to_string()
}

fn install_id(raw: &str) -> InstallId {
    InstallId::parse(raw).unwrap()
}

// ============================================================================
// SECTION: Report Dispatch
// ============================================================================

#[test]
fn identity_report_is_acknowledged_and_stored() {
    let fixture = fixture();
    let response = report(
        &fixture,
        ReportRoute::Identity,
        &json!({"id": INSTALL, "version": "1.0", "launchmode": "normal"}),
    );
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(body_json(&response), json!({"status": "ok"}));

    let record = fixture.store.load_identity(&install_id(INSTALL)).unwrap().unwrap();
    assert_eq!(record.attributes.version.as_deref(), Some("1.0"));
    assert_eq!(record.launch.normal, 1);
    assert_eq!(record.lastrequest, Some(now()));

    let requests = fixture.sink.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].outcome, RequestOutcome::Ok);
    assert_eq!(requests[0].install_id.as_deref(), Some(INSTALL));
    assert_eq!(requests[0].route, "/ut-stats");
}

#[test]
fn invalid_identifier_is_rejected_without_mutation() {
    let fixture = fixture();
    let response =
        report(&fixture, ReportRoute::Identity, &json!({"id": "not-a-uuid", "version": "1.0"}));
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(&response), "invalid_identifier");
    assert!(fixture.store.scan_identities().unwrap().is_empty());

    let requests = fixture.sink.requests.lock().unwrap();
    assert_eq!(requests[0].outcome, RequestOutcome::Rejected);
    assert_eq!(requests[0].error_kind, Some("invalid_identifier"));
    assert_eq!(requests[0].install_id, None);
}

#[test]
fn non_object_body_is_malformed() {
    let fixture = fixture();
    let response = dispatch_report(&fixture.state, ReportRoute::Usage, None, b"[1, 2, 3]");
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(&response), "malformed_payload");
}

#[test]
fn reserved_key_is_rejected_and_audited() {
    let fixture = fixture();
    let response = report(
        &fixture,
        ReportRoute::Identity,
        &json!({"id": INSTALL, "__proto__": {"admin": true}}),
    );
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(&response), "proto_pollution_attempt");
    assert!(fixture.store.scan_identities().unwrap().is_empty());

    let security = fixture.sink.security.lock().unwrap();
    assert_eq!(security.len(), 1);
    assert_eq!(security[0].field, "__proto__");
    assert_eq!(security[0].route, "/ut-stats");
    assert_eq!(security[0].peer_ip.as_deref(), Some("127.0.0.1"));
}

#[test]
fn oversized_report_body_is_rejected() {
    let fixture = fixture();
    let padding = "x".repeat(LIMITS.max_body_bytes);
    let body = json!({"id": INSTALL, "action": "open", "pad": padding});
    let response = report(&fixture, ReportRoute::Usage, &body);
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_kind(&response), "payload_too_large");
    assert!(fixture.store.scan_usage().unwrap().is_empty());
}

#[test]
fn crash_log_uses_its_own_body_limit() {
    let fixture = fixture();
    let text = "frame\n".repeat(150);
    assert!(text.len() > LIMITS.max_body_bytes);
    let response = report(&fixture, ReportRoute::CrashLog, &json!({"crashid": CRASH, "log": text}));
    assert_eq!(response.status, StatusCode::OK);

    let crash_id = CrashId::parse(CRASH).unwrap();
    let stored = fixture.store.load_crash_log(&crash_id).unwrap().unwrap();
    assert_eq!(stored.text, text);

    let too_big = "y".repeat(LIMITS.max_log_bytes);
    let response =
        report(&fixture, ReportRoute::CrashLog, &json!({"crashid": CRASH, "log": too_big}));
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    let stored = fixture.store.load_crash_log(&crash_id).unwrap().unwrap();
    assert_eq!(stored.text, text);
}

#[test]
fn crash_and_check_reports_are_applied() {
    let fixture = fixture();
    let response = report(
        &fixture,
        ReportRoute::Crash,
        &json!({"id": INSTALL, "crashid": CRASH, "version": "1.0", "message": "boom"}),
    );
    assert_eq!(response.status, StatusCode::OK);
    let crash = fixture
        .store
        .load_crash(&install_id(INSTALL), &CrashId::parse(CRASH).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(crash.metadata.message.as_deref(), Some("boom"));

    let response = report(
        &fixture,
        ReportRoute::Checks,
        &json!({"id": INSTALL, "checks": {"gpu": true, "cores": 8}}),
    );
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(fixture.store.scan_checks().unwrap().len(), 2);
}

// ============================================================================
// SECTION: Stats Egress
// ============================================================================

#[test]
fn segmented_stats_render_missing_group_first() {
    let fixture = fixture();
    report(&fixture, ReportRoute::Identity, &json!({"id": INSTALL, "version": "1.0"}));
    report(&fixture, ReportRoute::Identity, &json!({"id": OTHER_INSTALL}));

    let response = dispatch_stats(&fixture.state, StatsRoute::Segmented);
    assert_eq!(response.status, StatusCode::OK);
    let text = String::from_utf8(response.body.clone()).unwrap();
    assert!(text.contains(r#""version":{"undefined":1,"1.0":1}"#), "{text}");

    let body = body_json(&response);
    assert_eq!(body["total"]["idcount"], json!(2));
    assert_eq!(body["active"]["idcount"], json!(2));
    assert_eq!(body["outdated"]["idcount"], json!(0));
}

#[test]
fn segmented_stats_skip_ignored_installations() {
    let ignore = StaticIgnoreList::new([install_id(INSTALL)]);
    let fixture =
        fixture_with(SharedTelemetryStore::from_store(InMemoryTelemetryStore::new()), ignore);
    report(&fixture, ReportRoute::Identity, &json!({"id": INSTALL, "launchmode": "tray"}));
    report(&fixture, ReportRoute::Identity, &json!({"id": OTHER_INSTALL, "launchmode": "tray"}));

    let segmented = body_json(&dispatch_stats(&fixture.state, StatsRoute::Segmented));
    assert_eq!(segmented["total"]["idcount"], json!(1));

    let launch = body_json(&dispatch_stats(&fixture.state, StatsRoute::Launch));
    assert_eq!(launch, json!({"total": 2, "normal": 0, "tray": 2}));
}

#[tokio::test]
async fn usage_and_check_stats_over_blocking_tasks() {
    let fixture = fixture();
    for _ in 0 .. 3 {
        let body = serde_json::to_vec(&json!({"id": INSTALL, "action": "open"})).unwrap();
        let response =
            run_report(Arc::clone(&fixture.state), ReportRoute::Usage, None, Bytes::from(body))
                .await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let body = serde_json::to_vec(&json!({"id": INSTALL, "checks": {"gpu": true}})).unwrap();
    run_report(Arc::clone(&fixture.state), ReportRoute::Checks, None, Bytes::from(body)).await;

    let usage = run_stats(Arc::clone(&fixture.state), StatsRoute::Usage).await;
    assert_eq!(body_json(&usage), json!({"total": 3, "per_action": {"open": 3}}));

    let checks = run_stats(Arc::clone(&fixture.state), StatsRoute::Checks).await;
    assert_eq!(body_json(&checks), json!({"gpu": {"true": 1}}));
}

// ============================================================================
// SECTION: Storage Failures
// ============================================================================

/// Store whose every call fails.
struct FailingStore;

fn failure() -> StoreError {
    StoreError::Io("disk unavailable at /var/lib/ut-stats".to_string())
}

impl IdentityStore for FailingStore {
    fn upsert_identity(
        &self,
        _id: &InstallId,
        _attributes: IdentityAttributes,
        _launch_mode: Option<LaunchMode>,
        _at: Timestamp,
    ) -> Result<IdentityRecord, StoreError> {
        Err(failure())
    }

    fn load_identity(&self, _id: &InstallId) -> Result<Option<IdentityRecord>, StoreError> {
        Err(failure())
    }

    fn scan_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        Err(failure())
    }
}

impl UsageStore for FailingStore {
    fn increment_usage(&self, _id: &InstallId, _action: &ActionName) -> Result<u64, StoreError> {
        Err(failure())
    }

    fn scan_usage(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Err(failure())
    }
}

impl CrashStore for FailingStore {
    fn put_crash(&self, _record: &CrashRecord) -> Result<(), StoreError> {
        Err(failure())
    }

    fn load_crash(
        &self,
        _id: &InstallId,
        _crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, StoreError> {
        Err(failure())
    }

    fn put_crash_log(&self, _log: &CrashLog) -> Result<(), StoreError> {
        Err(failure())
    }

    fn load_crash_log(&self, _crash_id: &CrashId) -> Result<Option<CrashLog>, StoreError> {
        Err(failure())
    }
}

impl CheckStore for FailingStore {
    fn put_checks(
        &self,
        _id: &InstallId,
        _checks: &BTreeMap<CheckName, CheckValue>,
        _at: Timestamp,
    ) -> Result<(), StoreError> {
        Err(failure())
    }

    fn scan_checks(&self) -> Result<Vec<CheckRecord>, StoreError> {
        Err(failure())
    }
}

impl TelemetryStore for FailingStore {}

#[test]
fn storage_failure_maps_to_server_error_without_details() {
    let fixture =
        fixture_with(SharedTelemetryStore::from_store(FailingStore), StaticIgnoreList::default());
    let response = report(&fixture, ReportRoute::Usage, &json!({"id": INSTALL, "action": "open"}));
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_kind(&response), "storage_error");
    let text = String::from_utf8(response.body.clone()).unwrap();
    assert!(!text.contains("/var/lib"), "{text}");

    let stats = dispatch_stats(&fixture.state, StatsRoute::Segmented);
    assert_eq!(stats.status, StatusCode::INTERNAL_SERVER_ERROR);

    let requests = fixture.sink.requests.lock().unwrap();
    assert_eq!(requests[0].outcome, RequestOutcome::Failed);
    assert_eq!(requests[0].install_id.as_deref(), Some(INSTALL));
}

#[test]
fn refused_bodies_are_answered_in_json_and_audited() {
    let fixture = fixture();
    let too_large = reject_body(
        &fixture.state,
        ReportRoute::CrashLog,
        Some("127.0.0.1".to_string()),
        StatusCode::PAYLOAD_TOO_LARGE,
        9_000,
    );
    assert_eq!(too_large.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_kind(&too_large), "payload_too_large");

    let unreadable =
        reject_body(&fixture.state, ReportRoute::Usage, None, StatusCode::BAD_REQUEST, 0);
    assert_eq!(unreadable.status, StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(&unreadable), "malformed_payload");

    let requests = fixture.sink.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].route, "/ut-stats/crash/log");
    assert_eq!(requests[0].request_bytes, 9_000);
    assert_eq!(requests[0].error_kind, Some("payload_too_large"));
    assert_eq!(requests[1].outcome, RequestOutcome::Rejected);
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

#[test]
fn file_audit_sink_appends_json_lines() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let config = AuditConfig {
        sink: AuditSinkType::File,
        path: Some(path.clone()),
    };
    let audit = build_audit_sink(&config).unwrap();
    let state = ServerState::new(
        SharedTelemetryStore::from_store(InMemoryTelemetryStore::new()),
        SharedClock::from_clock(FixedClock::new(now())),
        StaticIgnoreList::default(),
        AggregateOptions::default(),
        audit,
        LIMITS,
    );
    let body = serde_json::to_vec(&json!({"id": INSTALL, "__proto__": {}})).unwrap();
    let response = dispatch_report(&state, ReportRoute::Identity, None, &body);
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let text = std::fs::read_to_string(&path).unwrap();
    let events: Vec<Value> =
        text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], json!("security_audit"));
    assert_eq!(events[0]["field"], json!("__proto__"));
    assert_eq!(events[1]["event"], json!("ut_stats_request"));
    assert_eq!(events[1]["outcome"], json!("rejected"));
}
