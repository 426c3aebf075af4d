// crates/ut-stats-store-sqlite/src/lib.rs
// ============================================================================
// Module: ut-stats SQLite Store
// Description: SQLite-backed telemetry store implementation.
// Purpose: Provide durable storage for identities, counters, crashes, and checks.
// Dependencies: ut-stats-core, rusqlite
// ============================================================================

//! ## Overview
//! Exposes [`SqliteTelemetryStore`], which implements every ut-stats store
//! interface on a single `SQLite` database file.

pub mod store;

pub use store::MAX_CRASH_LOG_BYTES;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTelemetryStore;
