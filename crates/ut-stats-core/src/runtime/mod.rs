// crates/ut-stats-core/src/runtime/mod.rs
// ============================================================================
// Module: ut-stats Runtime
// Description: Ingest and aggregation services plus reference backends.
// Purpose: Execute reports and stats queries against the interfaces.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime services over the storage and clock interfaces. [`TelemetryIngest`]
//! validates and records reports while [`StatsAggregator`] derives the stats
//! views. The in-memory store and fixed clock back tests and local runs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aggregate;
pub mod clock;
pub mod ignore;
pub mod ingest;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregate::AggregateOptions;
pub use aggregate::StatsAggregator;
pub use clock::FixedClock;
pub use clock::SharedClock;
pub use clock::SystemClock;
pub use ignore::IgnoreListError;
pub use ignore::StaticIgnoreList;
pub use ingest::TelemetryError;
pub use ingest::TelemetryIngest;
pub use store::InMemoryTelemetryStore;
pub use store::SharedTelemetryStore;
