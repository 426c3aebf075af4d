// crates/ut-stats-server/src/server.rs
// ============================================================================
// Module: ut-stats HTTP Server
// Description: HTTP ingress for telemetry reports and egress for stats.
// Purpose: Route report bodies through the allow-list parsers into the store.
// Dependencies: ut-stats-core, ut-stats-config, ut-stats-store-sqlite, axum, tokio
// ============================================================================

//! ## Overview
//! The server exposes one POST route per report kind and one GET route per
//! stats view. Every request body is size-checked, parsed through the
//! allow-list parsers in `ut_stats_core::core::report`, and applied on a
//! blocking task so store I/O never stalls the async executor. Every
//! response is JSON: `{"status":"ok"}` on success or
//! `{"error":{"kind","message"}}` on failure.
//! Security posture: report bodies are attacker-controlled; storage error
//! details are logged but never echoed to clients.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::CONTENT_LENGTH;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use bytes::Bytes;
use serde::Serialize;
use ut_stats_config::StoreConfig;
use ut_stats_config::StoreType;
use ut_stats_config::UtStatsConfig;
use ut_stats_core::AggregateOptions;
use ut_stats_core::CheckReport;
use ut_stats_core::Clock;
use ut_stats_core::CrashLogReport;
use ut_stats_core::CrashReport;
use ut_stats_core::IdentityReport;
use ut_stats_core::InMemoryTelemetryStore;
use ut_stats_core::InstallId;
use ut_stats_core::SharedClock;
use ut_stats_core::SharedTelemetryStore;
use ut_stats_core::StaticIgnoreList;
use ut_stats_core::StatsAggregator;
use ut_stats_core::SystemClock;
use ut_stats_core::TelemetryError;
use ut_stats_core::TelemetryIngest;
use ut_stats_core::TelemetryStore;
use ut_stats_core::UsageReport;
use ut_stats_store_sqlite::SqliteTelemetryStore;

use crate::audit::AuditSink;
use crate::audit::LifecycleAuditEvent;
use crate::audit::RequestAuditEvent;
use crate::audit::RequestAuditEventParams;
use crate::audit::RequestOutcome;
use crate::audit::SecurityAuditEvent;
use crate::audit::build_audit_sink;

// ============================================================================
// SECTION: Routes
// ============================================================================

/// Report ingress routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportRoute {
    /// Identity report with optional launch mode.
    Identity,
    /// Feature-usage action.
    Usage,
    /// Crash metadata.
    Crash,
    /// Crash log attachment.
    CrashLog,
    /// Runtime check values.
    Checks,
}

impl ReportRoute {
    /// Returns the route path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Identity => "/ut-stats",
            Self::Usage => "/ut-stats/usage",
            Self::Crash => "/ut-stats/crash",
            Self::CrashLog => "/ut-stats/crash/log",
            Self::Checks => "/ut-stats/checks",
        }
    }
}

/// Stats egress routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsRoute {
    /// Total, active, and outdated rollups.
    Segmented,
    /// Usage sums per action.
    Usage,
    /// Check value counts.
    Checks,
    /// Launch counter sums.
    Launch,
}

impl StatsRoute {
    /// Returns the route path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Segmented => "/ut-stats/stats",
            Self::Usage => "/ut-stats/stats/usage",
            Self::Checks => "/ut-stats/stats/checks",
            Self::Launch => "/ut-stats/stats/launch",
        }
    }
}

/// Readiness check path.
const READY_PATH: &str = "/ut-stats/ready";

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Request body ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyLimits {
    /// Maximum report body size in bytes.
    pub max_body_bytes: usize,
    /// Maximum crash log body size in bytes.
    pub max_log_bytes: usize,
}

impl BodyLimits {
    /// Returns the ceiling for `route`.
    #[must_use]
    pub const fn for_route(self, route: ReportRoute) -> usize {
        match route {
            ReportRoute::CrashLog => self.max_log_bytes,
            _ => self.max_body_bytes,
        }
    }

    /// Returns the largest ceiling across routes.
    const fn largest(self) -> usize {
        if self.max_log_bytes > self.max_body_bytes {
            self.max_log_bytes
        } else {
            self.max_body_bytes
        }
    }
}

/// Shared state for request handlers.
pub struct ServerState {
    /// Write path.
    ingest: TelemetryIngest<SharedTelemetryStore, SharedClock>,
    /// Read path.
    aggregator: StatsAggregator<SharedTelemetryStore, StaticIgnoreList>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Body ceilings.
    limits: BodyLimits,
}

impl ServerState {
    /// Assembles handler state from its parts.
    #[must_use]
    pub fn new(
        store: SharedTelemetryStore,
        clock: SharedClock,
        ignore: StaticIgnoreList,
        options: AggregateOptions,
        audit: Arc<dyn AuditSink>,
        limits: BodyLimits,
    ) -> Self {
        Self {
            ingest: TelemetryIngest::new(store.clone(), clock),
            aggregator: StatsAggregator::new(store, ignore, options),
            audit,
            limits,
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// ut-stats HTTP server instance.
pub struct StatsServer {
    /// Bind address.
    bind: SocketAddr,
    /// Store backend label for lifecycle logs.
    store_label: &'static str,
    /// Handler state.
    state: Arc<ServerState>,
}

impl StatsServer {
    /// Builds a server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or initialization fails.
    pub fn from_config(mut config: UtStatsConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let store = build_telemetry_store(&config.store)?;
        let audit = build_audit_sink(&config.audit)
            .map_err(|err| ServerError::Init(format!("audit sink: {err}")))?;
        let limits = BodyLimits {
            max_body_bytes: config.server.max_body_bytes,
            max_log_bytes: config.server.max_log_bytes,
        };
        let state = ServerState::new(
            store,
            SharedClock::from_clock(SystemClock),
            config.ignore_list().clone(),
            config.aggregate_options(),
            audit,
            limits,
        );
        Ok(Self {
            bind,
            store_label: config.store.store_type.label(),
            state: Arc::new(state),
        })
    }

    /// Returns the configured bind address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the axum router.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        let local = listener
            .local_addr()
            .map_or_else(|_| self.bind.to_string(), |addr| addr.to_string());
        self.state.audit.record_lifecycle(&LifecycleAuditEvent::startup(local, self.store_label));
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the telemetry store from configuration.
///
/// # Errors
///
/// Returns [`ServerError`] when the backend cannot be opened.
pub fn build_telemetry_store(config: &StoreConfig) -> Result<SharedTelemetryStore, ServerError> {
    match config.store_type {
        StoreType::Memory => Ok(SharedTelemetryStore::from_store(InMemoryTelemetryStore::new())),
        StoreType::Sqlite => {
            let sqlite_config =
                config.sqlite_config().map_err(|err| ServerError::Config(err.to_string()))?;
            let store = SqliteTelemetryStore::new(&sqlite_config)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(SharedTelemetryStore::from_store(store))
        }
    }
}

/// Opens the configured store for reading only.
///
/// A `SQLite` store must already exist; it is neither created nor migrated.
/// A memory store opens empty.
///
/// # Errors
///
/// Returns [`ServerError`] when the backend cannot be opened.
pub fn build_read_only_store(config: &StoreConfig) -> Result<SharedTelemetryStore, ServerError> {
    match config.store_type {
        StoreType::Memory => Ok(SharedTelemetryStore::from_store(InMemoryTelemetryStore::new())),
        StoreType::Sqlite => {
            let sqlite_config =
                config.sqlite_config().map_err(|err| ServerError::Config(err.to_string()))?;
            let store = SqliteTelemetryStore::open_read_only(&sqlite_config)
                .map_err(|err| ServerError::Init(err.to_string()))?;
            Ok(SharedTelemetryStore::from_store(store))
        }
    }
}

/// Builds the router over shared state.
///
/// Bodies above the largest per-route ceiling are refused while buffering and
/// answered by [`reject_body`].
pub fn build_router(state: Arc<ServerState>) -> Router {
    let body_limit = state.limits.largest().saturating_add(1);
    Router::new()
        .route(ReportRoute::Identity.path(), post(handle_identity))
        .route(ReportRoute::Usage.path(), post(handle_usage))
        .route(ReportRoute::Crash.path(), post(handle_crash))
        .route(ReportRoute::CrashLog.path(), post(handle_crash_log))
        .route(ReportRoute::Checks.path(), post(handle_checks))
        .route(StatsRoute::Segmented.path(), get(handle_segmented_stats))
        .route(StatsRoute::Usage.path(), get(handle_usage_stats))
        .route(StatsRoute::Checks.path(), get(handle_check_stats))
        .route(StatsRoute::Launch.path(), get(handle_launch_stats))
        .route(READY_PATH, get(handle_ready))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Handles identity reports.
async fn handle_identity(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    accept_report(state, ReportRoute::Identity, peer, &headers, body).await
}

/// Handles usage reports.
async fn handle_usage(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    accept_report(state, ReportRoute::Usage, peer, &headers, body).await
}

/// Handles crash reports.
async fn handle_crash(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    accept_report(state, ReportRoute::Crash, peer, &headers, body).await
}

/// Handles crash log attachments.
async fn handle_crash_log(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    accept_report(state, ReportRoute::CrashLog, peer, &headers, body).await
}

/// Handles check reports.
async fn handle_checks(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    accept_report(state, ReportRoute::Checks, peer, &headers, body).await
}

/// Routes an extracted body to dispatch, or answers a body rejection.
async fn accept_report(
    state: Arc<ServerState>,
    route: ReportRoute,
    peer: SocketAddr,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResponse {
    let peer_ip = Some(peer.ip().to_string());
    match body {
        Ok(bytes) => run_report(state, route, peer_ip, bytes).await,
        Err(rejection) => {
            let declared = declared_length(headers);
            reject_body(&state, route, peer_ip, rejection.status(), declared)
        }
    }
}

/// Reads the declared `Content-Length`, zero when absent or unparsable.
fn declared_length(headers: &HeaderMap) -> usize {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Handles segmented stats requests.
async fn handle_segmented_stats(State(state): State<Arc<ServerState>>) -> ApiResponse {
    run_stats(state, StatsRoute::Segmented).await
}

/// Handles usage stats requests.
async fn handle_usage_stats(State(state): State<Arc<ServerState>>) -> ApiResponse {
    run_stats(state, StatsRoute::Usage).await
}

/// Handles check stats requests.
async fn handle_check_stats(State(state): State<Arc<ServerState>>) -> ApiResponse {
    run_stats(state, StatsRoute::Checks).await
}

/// Handles launch stats requests.
async fn handle_launch_stats(State(state): State<Arc<ServerState>>) -> ApiResponse {
    run_stats(state, StatsRoute::Launch).await
}

/// Handles readiness probes.
async fn handle_ready(State(state): State<Arc<ServerState>>) -> ApiResponse {
    let result = tokio::task::spawn_blocking(move || state.ingest.store().readiness()).await;
    match result {
        Ok(Ok(())) => ApiResponse::ok(),
        Ok(Err(err)) => ApiResponse::from_error(&TelemetryError::Storage(err)),
        Err(_) => ApiResponse::join_failure(),
    }
}

/// Runs a report on a blocking task.
pub async fn run_report(
    state: Arc<ServerState>,
    route: ReportRoute,
    peer_ip: Option<String>,
    bytes: Bytes,
) -> ApiResponse {
    tokio::task::spawn_blocking(move || dispatch_report(&state, route, peer_ip, &bytes))
        .await
        .unwrap_or_else(|_| ApiResponse::join_failure())
}

/// Runs a stats query on a blocking task.
pub async fn run_stats(state: Arc<ServerState>, route: StatsRoute) -> ApiResponse {
    tokio::task::spawn_blocking(move || dispatch_stats(&state, route))
        .await
        .unwrap_or_else(|_| ApiResponse::join_failure())
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Parsed report awaiting application.
enum ParsedReport {
    /// Identity report.
    Identity(IdentityReport),
    /// Usage report.
    Usage(UsageReport),
    /// Crash report.
    Crash(CrashReport),
    /// Crash log report.
    CrashLog(CrashLogReport),
    /// Check report.
    Checks(CheckReport),
}

impl ParsedReport {
    /// Parses `bytes` with the allow-list for `route`.
    fn parse(route: ReportRoute, bytes: &[u8]) -> Result<Self, TelemetryError> {
        let parsed = match route {
            ReportRoute::Identity => Self::Identity(IdentityReport::from_slice(bytes)?),
            ReportRoute::Usage => Self::Usage(UsageReport::from_slice(bytes)?),
            ReportRoute::Crash => Self::Crash(CrashReport::from_slice(bytes)?),
            ReportRoute::CrashLog => Self::CrashLog(CrashLogReport::from_slice(bytes)?),
            ReportRoute::Checks => Self::Checks(CheckReport::from_slice(bytes)?),
        };
        Ok(parsed)
    }

    /// Returns the reporting installation when the report carries one.
    fn install_id(&self) -> Option<&InstallId> {
        match self {
            Self::Identity(report) => Some(&report.id),
            Self::Usage(report) => Some(&report.id),
            Self::Crash(report) => Some(&report.id),
            Self::CrashLog(_) => None,
            Self::Checks(report) => Some(&report.id),
        }
    }

    /// Applies the report to the store.
    fn apply(
        self,
        ingest: &TelemetryIngest<SharedTelemetryStore, SharedClock>,
    ) -> Result<(), TelemetryError> {
        match self {
            Self::Identity(report) => ingest.report_identity(report).map(|_| ()),
            Self::Usage(report) => ingest.report_usage(&report).map(|_| ()),
            Self::Crash(report) => ingest.report_crash(report).map(|_| ()),
            Self::CrashLog(report) => ingest.attach_crash_log(report).map(|_| ()),
            Self::Checks(report) => ingest.report_checks(&report).map(|_| ()),
        }
    }
}

/// Size-checks, parses, and applies one report.
pub fn dispatch_report(
    state: &ServerState,
    route: ReportRoute,
    peer_ip: Option<String>,
    bytes: &[u8],
) -> ApiResponse {
    let request_bytes = bytes.len();
    if request_bytes > state.limits.for_route(route) {
        let response = ApiResponse::too_large();
        let error_kind = Some("payload_too_large");
        record_request(state, route, peer_ip, &response, error_kind, request_bytes, None);
        return response;
    }
    let parsed = match ParsedReport::parse(route, bytes) {
        Ok(parsed) => parsed,
        Err(err) => {
            if let TelemetryError::ProtoPollutionAttempt {
                field,
            } = &err
            {
                state.audit.record_security(&SecurityAuditEvent::proto_pollution(
                    field.clone(),
                    route.path(),
                    peer_ip.clone(),
                ));
            }
            let response = ApiResponse::from_error(&err);
            record_request(state, route, peer_ip, &response, Some(err.kind()), request_bytes, None);
            return response;
        }
    };
    let install_id = parsed.install_id().map(ToString::to_string);
    let (response, error_kind) = match parsed.apply(&state.ingest) {
        Ok(()) => (ApiResponse::ok(), None),
        Err(err) => (ApiResponse::from_error(&err), Some(err.kind())),
    };
    record_request(state, route, peer_ip, &response, error_kind, request_bytes, install_id);
    response
}

/// Answers a report whose body the transport refused to buffer.
///
/// Length-limit rejections become the JSON 413 response; any other body
/// failure is a malformed payload. Both are audited like dispatched reports.
pub fn reject_body(
    state: &ServerState,
    route: ReportRoute,
    peer_ip: Option<String>,
    rejection_status: StatusCode,
    request_bytes: usize,
) -> ApiResponse {
    let (response, error_kind) = if rejection_status == StatusCode::PAYLOAD_TOO_LARGE {
        (ApiResponse::too_large(), "payload_too_large")
    } else {
        let kind = "malformed_payload";
        let message = "request body could not be read".to_string();
        (ApiResponse::error(StatusCode::BAD_REQUEST, kind, message), kind)
    };
    record_request(state, route, peer_ip, &response, Some(error_kind), request_bytes, None);
    response
}

/// Computes one stats view.
pub fn dispatch_stats(state: &ServerState, route: StatsRoute) -> ApiResponse {
    let aggregator = &state.aggregator;
    let result = match route {
        StatsRoute::Segmented => {
            let now = state.ingest.clock().now();
            aggregator.compute_segmented_stats(now).map(|stats| ApiResponse::json(&stats))
        }
        StatsRoute::Usage => {
            aggregator.compute_usage_stats().map(|stats| ApiResponse::json(&stats))
        }
        StatsRoute::Checks => {
            aggregator.compute_check_stats().map(|stats| ApiResponse::json(&stats))
        }
        StatsRoute::Launch => {
            aggregator.compute_launch_stats().map(|stats| ApiResponse::json(&stats))
        }
    };
    let (response, error_kind) = match result {
        Ok(response) => (response, None),
        Err(err) => (ApiResponse::from_error(&err), Some(err.kind())),
    };
    state.audit.record(&RequestAuditEvent::new(RequestAuditEventParams {
        route: route.path(),
        peer_ip: None,
        outcome: outcome_for(response.status),
        status: response.status.as_u16(),
        error_kind,
        request_bytes: 0,
        install_id: None,
    }));
    response
}

/// Emits the per-request audit event.
fn record_request(
    state: &ServerState,
    route: ReportRoute,
    peer_ip: Option<String>,
    response: &ApiResponse,
    error_kind: Option<&'static str>,
    request_bytes: usize,
    install_id: Option<String>,
) {
    state.audit.record(&RequestAuditEvent::new(RequestAuditEventParams {
        route: route.path(),
        peer_ip,
        outcome: outcome_for(response.status),
        status: response.status.as_u16(),
        error_kind,
        request_bytes,
        install_id,
    }));
}

/// Classifies a response status.
fn outcome_for(status: StatusCode) -> RequestOutcome {
    if status.is_success() {
        RequestOutcome::Ok
    } else if status.is_client_error() {
        RequestOutcome::Rejected
    } else {
        RequestOutcome::Failed
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Success body.
#[derive(Serialize)]
struct OkBody {
    /// Always `ok`.
    status: &'static str,
}

/// Error body.
#[derive(Serialize)]
struct ErrorBody {
    /// Error payload.
    error: ErrorDetail,
}

/// Error payload.
#[derive(Serialize)]
struct ErrorDetail {
    /// Stable error kind label.
    kind: &'static str,
    /// Human-readable message.
    message: String,
}

/// Serialized JSON response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// JSON body bytes.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Builds a success acknowledgement.
    fn ok() -> Self {
        Self::json_with_status(
            StatusCode::OK,
            &OkBody {
                status: "ok",
            },
        )
    }

    /// Serializes a stats payload.
    ///
    /// Serialization goes straight to bytes so grouped keys keep their
    /// deterministic order.
    fn json(value: &impl Serialize) -> Self {
        Self::json_with_status(StatusCode::OK, value)
    }

    /// Maps a telemetry error to a status and body.
    fn from_error(error: &TelemetryError) -> Self {
        if error.is_client_error() {
            Self::error(StatusCode::BAD_REQUEST, error.kind(), error.to_string())
        } else {
            Self::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                error.kind(),
                "internal storage failure".to_string(),
            )
        }
    }

    /// Builds the oversized-body response.
    fn too_large() -> Self {
        Self::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "request body too large".to_string(),
        )
    }

    /// Builds the blocking-task failure response.
    fn join_failure() -> Self {
        Self::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "storage_error",
            "internal storage failure".to_string(),
        )
    }

    /// Builds an error response.
    fn error(status: StatusCode, kind: &'static str, message: String) -> Self {
        Self::json_with_status(
            status,
            &ErrorBody {
                error: ErrorDetail {
                    kind,
                    message,
                },
            },
        )
    }

    /// Serializes `value` with `status`.
    fn json_with_status(status: StatusCode, value: &impl Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                body,
            },
            Err(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: br#"{"error":{"kind":"storage_error","message":"serialization failed"}}"#
                    .to_vec(),
            },
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, [(CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
