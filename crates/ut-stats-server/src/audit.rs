// crates/ut-stats-server/src/audit.rs
// ============================================================================
// Module: ut-stats Audit Logging
// Description: Structured audit events for report and stats handling.
// Purpose: Emit JSON-lines request, security, and lifecycle events.
// Dependencies: ut-stats-config, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the HTTP layer.
//! Events are serialized as one JSON object per line so deployments can route
//! them to any log pipeline. Report bodies are never logged; only sizes,
//! outcomes, and validated identifiers are.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use ut_stats_config::AuditConfig;
use ut_stats_config::AuditSinkType;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Request handled successfully.
    Ok,
    /// Request rejected as a client error.
    Rejected,
    /// Request failed on the server side.
    Failed,
}

/// Per-request audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Route path.
    pub route: &'static str,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// HTTP status code.
    pub status: u16,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Validated installation identifier when known.
    pub install_id: Option<String>,
}

/// Security audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Security event kind.
    pub kind: &'static str,
    /// Offending field name.
    pub field: String,
    /// Route path.
    pub route: &'static str,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
}

/// Server lifecycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Lifecycle phase label.
    pub phase: &'static str,
    /// Bound address.
    pub bind: String,
    /// Store backend label.
    pub store: &'static str,
}

/// Inputs required to construct a request audit event.
pub struct RequestAuditEventParams {
    /// Route path.
    pub route: &'static str,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Request outcome.
    pub outcome: RequestOutcome,
    /// HTTP status code.
    pub status: u16,
    /// Normalized error kind label.
    pub error_kind: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Validated installation identifier when known.
    pub install_id: Option<String>,
}

impl RequestAuditEvent {
    /// Creates a new request audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: RequestAuditEventParams) -> Self {
        Self {
            event: "ut_stats_request",
            timestamp_ms: now_ms(),
            route: params.route,
            peer_ip: params.peer_ip,
            outcome: params.outcome,
            status: params.status,
            error_kind: params.error_kind,
            request_bytes: params.request_bytes,
            install_id: params.install_id,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a reserved-key audit event.
    #[must_use]
    pub fn proto_pollution(field: String, route: &'static str, peer_ip: Option<String>) -> Self {
        Self {
            event: "security_audit",
            timestamp_ms: now_ms(),
            kind: "proto_pollution_attempt",
            field,
            route,
            peer_ip,
        }
    }
}

impl LifecycleAuditEvent {
    /// Creates a startup event.
    #[must_use]
    pub fn startup(bind: String, store: &'static str) -> Self {
        Self {
            event: "server_lifecycle",
            timestamp_ms: now_ms(),
            phase: "startup",
            bind,
            store,
        }
    }
}

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for server events.
pub trait AuditSink: Send + Sync {
    /// Record a request audit event.
    fn record(&self, event: &RequestAuditEvent);

    /// Record a security audit event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}

    /// Record a lifecycle audit event.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes one serialized event.
    fn emit(event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        Self::emit(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn emit(&self, event: &impl Serialize) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &RequestAuditEvent) {
        self.emit(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &RequestAuditEvent) {}
}

/// Builds the configured audit sink.
///
/// # Errors
///
/// Returns an error when the file sink cannot be opened.
pub fn build_audit_sink(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    match (config.sink, &config.path) {
        (AuditSinkType::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkType::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkType::File, Some(path)) => Ok(Arc::new(FileAuditSink::new(path)?)),
        (AuditSinkType::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "file audit sink requires a path"))
        }
    }
}
