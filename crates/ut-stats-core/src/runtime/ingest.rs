// crates/ut-stats-core/src/runtime/ingest.rs
// ============================================================================
// Module: ut-stats Ingest Service
// Description: Applies validated reports to the telemetry stores.
// Purpose: Own the write path for identity, usage, crash, and check reports.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The ingest service stamps each report with the injected clock and hands it
//! to the store as a single atomic call. Reports reach this layer already
//! parsed through the allow-list, so every error raised here after parsing is
//! a storage failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::CheckReport;
use crate::core::CrashLog;
use crate::core::CrashLogReport;
use crate::core::CrashRecord;
use crate::core::CrashReport;
use crate::core::DEFAULT_HASH_ALGORITHM;
use crate::core::IdentifierError;
use crate::core::IdentityRecord;
use crate::core::IdentityReport;
use crate::core::ReportError;
use crate::core::TimestampError;
use crate::core::UsageReport;
use crate::core::hash_bytes;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;
use crate::interfaces::TelemetryStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by ingest and aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// `id` or `crashid` failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(IdentifierError),
    /// Payload fields are missing or mis-shaped.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// Payload used a reserved key.
    #[error("reserved key in payload: {field}")]
    ProtoPollutionAttempt {
        /// Offending key.
        field: String,
    },
    /// The store failed.
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl TelemetryError {
    /// Returns a stable label for logs and error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::ProtoPollutionAttempt {
                ..
            } => "proto_pollution_attempt",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Returns true when the client is at fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<ReportError> for TelemetryError {
    fn from(error: ReportError) -> Self {
        match error {
            ReportError::InvalidIdentifier(inner) => Self::InvalidIdentifier(inner),
            ReportError::MalformedPayload(message) => Self::MalformedPayload(message),
            ReportError::ProtoPollutionAttempt {
                field,
            } => Self::ProtoPollutionAttempt {
                field,
            },
        }
    }
}

impl From<StoreError> for TelemetryError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error)
    }
}

impl From<TimestampError> for TelemetryError {
    fn from(error: TimestampError) -> Self {
        Self::Storage(StoreError::Invalid(error.to_string()))
    }
}

// ============================================================================
// SECTION: Ingest Service
// ============================================================================

/// Write path over a telemetry store.
#[derive(Debug, Clone)]
pub struct TelemetryIngest<S, C> {
    /// Destination store.
    store: S,
    /// Time source for `lastrequest` and record stamps.
    clock: C,
}

impl<S: TelemetryStore, C: Clock> TelemetryIngest<S, C> {
    /// Creates an ingest service.
    #[must_use]
    pub const fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
        }
    }

    /// Returns the backing store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Merges an identity report into the installation's record.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the upsert fails.
    pub fn report_identity(
        &self,
        report: IdentityReport,
    ) -> Result<IdentityRecord, TelemetryError> {
        let now = self.clock.now();
        Ok(self.store.upsert_identity(&report.id, report.attributes, report.launch_mode, now)?)
    }

    /// Counts one feature-usage action; returns the pair's new count.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the increment fails.
    pub fn report_usage(&self, report: &UsageReport) -> Result<u64, TelemetryError> {
        Ok(self.store.increment_usage(&report.id, &report.action)?)
    }

    /// Records crash metadata, overwriting a prior report of the same crash.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the write fails.
    pub fn report_crash(&self, report: CrashReport) -> Result<CrashRecord, TelemetryError> {
        let record = CrashRecord {
            id: report.id,
            crash_id: report.crash_id,
            metadata: report.metadata,
            reported_at: self.clock.now(),
        };
        self.store.put_crash(&record)?;
        Ok(record)
    }

    /// Stores a crash log, overwriting any prior log for the crash.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the write fails.
    pub fn attach_crash_log(&self, report: CrashLogReport) -> Result<CrashLog, TelemetryError> {
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, report.text.as_bytes());
        let log = CrashLog {
            crash_id: report.crash_id,
            text: report.text,
            digest,
            attached_at: self.clock.now(),
        };
        self.store.put_crash_log(&log)?;
        Ok(log)
    }

    /// Records every check value in one unit; returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the write fails; no value is
    /// applied in that case.
    pub fn report_checks(&self, report: &CheckReport) -> Result<usize, TelemetryError> {
        self.store.put_checks(&report.id, &report.checks, self.clock.now())?;
        Ok(report.checks.len())
    }
}
