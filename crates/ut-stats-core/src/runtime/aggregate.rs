// crates/ut-stats-core/src/runtime/aggregate.rs
// ============================================================================
// Module: ut-stats Stats Aggregator
// Description: Read-only rollups over the telemetry stores.
// Purpose: Compute segmented, usage, check, and launch statistics.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Segmented stats always skip ignored installations. Usage, check, and
//! launch sums skip them only when [`AggregateOptions::filter_ignored_everywhere`]
//! is set; the default keeps those sums global.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::CheckStats;
use crate::core::LaunchCounts;
use crate::core::LaunchStats;
use crate::core::SegmentedStats;
use crate::core::Timestamp;
use crate::core::UsageStats;
use crate::interfaces::IgnoreList;
use crate::interfaces::TelemetryStore;
use crate::runtime::ingest::TelemetryError;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Aggregation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Apply the ignore list to usage, check, and launch sums too.
    pub filter_ignored_everywhere: bool,
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Read path over a telemetry store.
#[derive(Debug, Clone)]
pub struct StatsAggregator<S, I> {
    /// Source store.
    store: S,
    /// Installations excluded from stats.
    ignore: I,
    /// Aggregation switches.
    options: AggregateOptions,
}

impl<S: TelemetryStore, I: IgnoreList> StatsAggregator<S, I> {
    /// Creates an aggregator.
    #[must_use]
    pub const fn new(store: S, ignore: I, options: AggregateOptions) -> Self {
        Self {
            store,
            ignore,
            options,
        }
    }

    /// Computes total, active, and outdated rollups as of `now`.
    ///
    /// An installation is active when its `lastrequest` is strictly after
    /// `now` minus one calendar month.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the scan fails.
    pub fn compute_segmented_stats(
        &self,
        now: Timestamp,
    ) -> Result<SegmentedStats, TelemetryError> {
        let cutoff = now.minus_one_month()?;
        let mut stats = SegmentedStats::default();
        for record in self.store.scan_identities()? {
            if self.ignore.contains(&record.id) {
                continue;
            }
            stats.add_record(&record, cutoff);
        }
        Ok(stats)
    }

    /// Sums usage counts per action.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the scan fails.
    pub fn compute_usage_stats(&self) -> Result<UsageStats, TelemetryError> {
        if !self.options.filter_ignored_everywhere {
            return Ok(UsageStats::from_per_action(self.store.sum_usage_by_action()?));
        }
        let mut per_action = BTreeMap::new();
        for record in self.store.scan_usage()? {
            if self.ignore.contains(&record.id) {
                continue;
            }
            let slot: &mut u64 = per_action.entry(record.action).or_insert(0);
            *slot = slot.saturating_add(record.count);
        }
        Ok(UsageStats::from_per_action(per_action))
    }

    /// Counts installations per check variable value.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the scan fails.
    pub fn compute_check_stats(&self) -> Result<CheckStats, TelemetryError> {
        let mut stats = CheckStats::default();
        for record in self.store.scan_checks()? {
            if self.options.filter_ignored_everywhere && self.ignore.contains(&record.id) {
                continue;
            }
            stats.add(&record.name, record.value.label());
        }
        Ok(stats)
    }

    /// Sums launch counters across installations.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Storage`] when the scan fails.
    pub fn compute_launch_stats(&self) -> Result<LaunchStats, TelemetryError> {
        let mut counts = LaunchCounts::default();
        for record in self.store.scan_identities()? {
            if self.options.filter_ignored_everywhere && self.ignore.contains(&record.id) {
                continue;
            }
            counts.add(record.launch);
        }
        Ok(LaunchStats::from(counts))
    }
}
