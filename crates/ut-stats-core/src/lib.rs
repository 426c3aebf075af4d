// crates/ut-stats-core/src/lib.rs
// ============================================================================
// Module: ut-stats Core Library
// Description: Public API surface for the telemetry core.
// Purpose: Expose the data model, store interfaces, and ingest/stats services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! ut-stats core merges client telemetry reports into per-installation state
//! and computes rolled-up statistics from it. Identity attributes overwrite,
//! launch and usage counters only ever increase, and stats segment
//! installations into active and outdated by last report time. The core is
//! backend-agnostic and reaches storage, time, and the ignore list only
//! through the traits in [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CheckStore;
pub use interfaces::Clock;
pub use interfaces::CrashStore;
pub use interfaces::IdentityStore;
pub use interfaces::IgnoreList;
pub use interfaces::StoreError;
pub use interfaces::TelemetryStore;
pub use interfaces::UsageStore;
pub use runtime::AggregateOptions;
pub use runtime::FixedClock;
pub use runtime::IgnoreListError;
pub use runtime::InMemoryTelemetryStore;
pub use runtime::SharedClock;
pub use runtime::SharedTelemetryStore;
pub use runtime::StaticIgnoreList;
pub use runtime::StatsAggregator;
pub use runtime::SystemClock;
pub use runtime::TelemetryError;
pub use runtime::TelemetryIngest;
