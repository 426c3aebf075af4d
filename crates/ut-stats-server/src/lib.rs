// crates/ut-stats-server/src/lib.rs
// ============================================================================
// Module: ut-stats Server
// Description: HTTP transport and audit logging for the ut-stats service.
// Purpose: Expose report ingress and stats egress over HTTP.
// Dependencies: ut-stats-core, ut-stats-config, axum, tokio
// ============================================================================

//! ## Overview
//! `ut-stats-server` wires the telemetry core to HTTP. Reports are parsed
//! through the core's allow-list parsers and applied on blocking tasks;
//! stats are computed on demand. Every request emits a JSON-lines audit
//! event.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::LifecycleAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::RequestAuditEvent;
pub use audit::RequestOutcome;
pub use audit::SecurityAuditEvent;
pub use audit::StderrAuditSink;
pub use server::ApiResponse;
pub use server::BodyLimits;
pub use server::ReportRoute;
pub use server::ServerError;
pub use server::ServerState;
pub use server::StatsRoute;
pub use server::StatsServer;
pub use server::build_router;
pub use server::build_read_only_store;
pub use server::build_telemetry_store;
