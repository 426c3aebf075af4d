// crates/ut-stats-core/src/core/mod.rs
// ============================================================================
// Module: ut-stats Core Model
// Description: Identifiers, records, reports, and stats shapes.
// Purpose: Group the backend-agnostic data model behind one module.
// Dependencies: serde, serde_json, sha2, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! The core model holds every type that crosses a store or HTTP boundary.
//! Nothing in here performs I/O.

pub mod hashing;
pub mod identifiers;
pub mod records;
pub mod report;
pub mod stats;
pub mod time;

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::hash_bytes;
pub use identifiers::ActionName;
pub use identifiers::CheckName;
pub use identifiers::CrashId;
pub use identifiers::IdentifierError;
pub use identifiers::InstallId;
pub use records::CheckRecord;
pub use records::CheckValue;
pub use records::CrashLog;
pub use records::CrashMetadata;
pub use records::CrashRecord;
pub use records::IdentityAttributes;
pub use records::IdentityDimension;
pub use records::IdentityFlag;
pub use records::IdentityRecord;
pub use records::LaunchCounts;
pub use records::LaunchMode;
pub use records::UsageRecord;
pub use report::CheckReport;
pub use report::CrashLogReport;
pub use report::CrashReport;
pub use report::IdentityReport;
pub use report::ReportError;
pub use report::UsageReport;
pub use stats::Activity;
pub use stats::CheckStats;
pub use stats::GroupKey;
pub use stats::GroupedCounts;
pub use stats::LaunchStats;
pub use stats::SegmentStats;
pub use stats::SegmentedStats;
pub use stats::UsageStats;
pub use time::Timestamp;
pub use time::TimestampError;
