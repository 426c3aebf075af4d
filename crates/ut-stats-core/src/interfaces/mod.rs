// crates/ut-stats-core/src/interfaces/mod.rs
// ============================================================================
// Module: ut-stats Interfaces
// Description: Backend-agnostic store, ignore-list, and clock contracts.
// Purpose: Define the seams the ingest and aggregation services run against.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Every mutating store call is one atomic read-modify-write at the backend.
//! Scans return per-record consistent snapshots; cross-record consistency
//! during concurrent writes is not required.
//!
//! Security posture: implementations receive only validated identifiers and
//! allow-listed fields.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::ActionName;
use crate::core::CheckName;
use crate::core::CheckRecord;
use crate::core::CheckValue;
use crate::core::CrashId;
use crate::core::CrashLog;
use crate::core::CrashRecord;
use crate::core::IdentityAttributes;
use crate::core::IdentityRecord;
use crate::core::InstallId;
use crate::core::LaunchMode;
use crate::core::Timestamp;
use crate::core::UsageRecord;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Telemetry store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("telemetry store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("telemetry store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("telemetry store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("telemetry store invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("telemetry store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Identity Store
// ============================================================================

/// Durable latest-state per installation.
pub trait IdentityStore {
    /// Replaces scalar attributes, bumps the launch counter for `launch_mode`,
    /// and sets `lastrequest` to `at`, creating the record when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; nothing is applied.
    fn upsert_identity(
        &self,
        id: &InstallId,
        attributes: IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) -> Result<IdentityRecord, StoreError>;

    /// Loads one identity record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_identity(&self, id: &InstallId) -> Result<Option<IdentityRecord>, StoreError>;

    /// Returns every identity record ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn scan_identities(&self) -> Result<Vec<IdentityRecord>, StoreError>;
}

// ============================================================================
// SECTION: Usage Store
// ============================================================================

/// Durable per-(installation, action) counters.
pub trait UsageStore {
    /// Adds one to the pair's count, creating it at 1; returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the increment fails.
    fn increment_usage(&self, id: &InstallId, action: &ActionName) -> Result<u64, StoreError>;

    /// Returns every usage record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn scan_usage(&self) -> Result<Vec<UsageRecord>, StoreError>;

    /// Sums counts per action across installations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn sum_usage_by_action(&self) -> Result<BTreeMap<ActionName, u64>, StoreError> {
        let mut sums = BTreeMap::new();
        for record in self.scan_usage()? {
            let slot: &mut u64 = sums.entry(record.action).or_insert(0);
            *slot = slot.saturating_add(record.count);
        }
        Ok(sums)
    }
}

// ============================================================================
// SECTION: Crash Store
// ============================================================================

/// Durable crash metadata and log blobs.
pub trait CrashStore {
    /// Writes crash metadata, replacing any prior record for the same pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_crash(&self, record: &CrashRecord) -> Result<(), StoreError>;

    /// Loads crash metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_crash(
        &self,
        id: &InstallId,
        crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, StoreError>;

    /// Writes a crash log, replacing any prior log for the crash.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn put_crash_log(&self, log: &CrashLog) -> Result<(), StoreError>;

    /// Loads a crash log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails or the digest does not match.
    fn load_crash_log(&self, crash_id: &CrashId) -> Result<Option<CrashLog>, StoreError>;
}

// ============================================================================
// SECTION: Check Store
// ============================================================================

/// Durable last-value per (installation, check variable).
pub trait CheckStore {
    /// Writes every value for `id` in one unit; on failure none are applied.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any write fails.
    fn put_checks(
        &self,
        id: &InstallId,
        checks: &BTreeMap<CheckName, CheckValue>,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Returns every check record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the scan fails.
    fn scan_checks(&self) -> Result<Vec<CheckRecord>, StoreError>;
}

// ============================================================================
// SECTION: Telemetry Store
// ============================================================================

/// Umbrella over every per-component store.
pub trait TelemetryStore: IdentityStore + UsageStore + CrashStore + CheckStore {
    /// Checks store readiness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Ignore List
// ============================================================================

/// Operator-maintained set of installations excluded from stats.
pub trait IgnoreList {
    /// Returns true when `id` is excluded.
    fn contains(&self, id: &InstallId) -> bool;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}
