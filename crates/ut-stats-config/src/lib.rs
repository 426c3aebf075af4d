// crates/ut-stats-config/src/lib.rs
// ============================================================================
// Module: ut-stats Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for ut-stats.toml semantics.
// Dependencies: ut-stats-core, ut-stats-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `ut-stats-config` defines the configuration model for the ut-stats
//! service and validates it fail-closed, including the ignore list.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
