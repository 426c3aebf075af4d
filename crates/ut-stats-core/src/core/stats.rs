// crates/ut-stats-core/src/core/stats.rs
// ============================================================================
// Module: ut-stats Stats Model
// Description: Aggregated statistics shapes returned by the aggregator.
// Purpose: Define deterministic, serializable rollups over stored records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Grouped counts map each observed value to the number of records holding it.
//! The absent value is a real group, rendered as `"undefined"` and ordered
//! before every reported value so output is stable across runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::core::identifiers::ActionName;
use crate::core::identifiers::CheckName;
use crate::core::records::IdentityDimension;
use crate::core::records::IdentityFlag;
use crate::core::records::IdentityRecord;
use crate::core::records::LaunchCounts;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wire label for the absent-value group.
pub const MISSING_GROUP_LABEL: &str = "undefined";

// ============================================================================
// SECTION: Grouped Counts
// ============================================================================

/// Key of one group within a dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// The record did not report this attribute.
    Missing,
    /// Reported value.
    Value(String),
}

impl GroupKey {
    /// Builds a key from an optional attribute value.
    #[must_use]
    pub fn from_option(value: Option<&str>) -> Self {
        value.map_or(Self::Missing, |value| Self::Value(value.to_string()))
    }

    /// Returns the wire label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Missing => MISSING_GROUP_LABEL,
            Self::Value(value) => value,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for GroupKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text == MISSING_GROUP_LABEL { Ok(Self::Missing) } else { Ok(Self::Value(text)) }
    }
}

/// Count of records per distinct value of one dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedCounts(BTreeMap<GroupKey, u64>);

impl GroupedCounts {
    /// Counts one record holding `value`.
    pub fn add(&mut self, value: Option<&str>) {
        let slot = self.0.entry(GroupKey::from_option(value)).or_insert(0);
        *slot = slot.saturating_add(1);
    }

    /// Returns the count for a group, zero when unseen.
    #[must_use]
    pub fn get(&self, key: &GroupKey) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Returns the sum of all group counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.values().fold(0_u64, |acc, count| acc.saturating_add(*count))
    }

    /// Iterates groups in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &u64)> {
        self.0.iter()
    }

    /// Returns the number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no records were counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// SECTION: Segments
// ============================================================================

/// Recency bucket for an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Reported strictly after the cutoff.
    Active,
    /// Reported on or before the cutoff, or never.
    Outdated,
}

impl Activity {
    /// Classifies a last-request time against the activity cutoff.
    #[must_use]
    pub fn classify(lastrequest: Option<Timestamp>, cutoff: Timestamp) -> Self {
        match lastrequest {
            Some(seen) if seen > cutoff => Self::Active,
            _ => Self::Outdated,
        }
    }
}

/// Rollup of one set of identity records.
///
/// # Invariants
/// - Every grouped dimension sums to `idcount`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Number of records in the segment.
    pub idcount: u64,
    /// Records with `isdeb` true.
    pub isdeb: u64,
    /// Records with `trayena` true.
    pub trayena: u64,
    /// Records with `wifiena` true.
    pub wifiena: u64,
    /// Records with `defaultos` true.
    pub defaultos: u64,
    /// Records with `weirdpc` true.
    pub weirdpc: u64,
    /// Summed launch counters.
    pub launchcount: LaunchCounts,
    /// Records per application version.
    pub version: GroupedCounts,
    /// Records per build.
    pub build: GroupedCounts,
    /// Records per product-suite version.
    pub utsversion: GroupedCounts,
    /// Records per machine model.
    pub pcmodel: GroupedCounts,
    /// Records per machine year.
    pub pcyear: GroupedCounts,
    /// Records per OS version.
    pub osversion: GroupedCounts,
    /// Records per language.
    pub lang: GroupedCounts,
}

impl SegmentStats {
    /// Folds one record into the segment.
    pub fn add_record(&mut self, record: &IdentityRecord) {
        self.idcount = self.idcount.saturating_add(1);
        for flag in IdentityFlag::ALL {
            if record.attributes.flag(flag) == Some(true) {
                let slot = self.flag_slot(flag);
                *slot = slot.saturating_add(1);
            }
        }
        self.launchcount.add(record.launch);
        for dimension in IdentityDimension::ALL {
            let value = record.attributes.dimension(dimension);
            self.dimension_slot(dimension).add(value);
        }
    }

    /// Returns the count of records with `flag` true.
    #[must_use]
    pub const fn flag_count(&self, flag: IdentityFlag) -> u64 {
        match flag {
            IdentityFlag::IsDeb => self.isdeb,
            IdentityFlag::TrayEna => self.trayena,
            IdentityFlag::WifiEna => self.wifiena,
            IdentityFlag::DefaultOs => self.defaultos,
            IdentityFlag::WeirdPc => self.weirdpc,
        }
    }

    /// Returns the grouped counts for a dimension.
    #[must_use]
    pub const fn dimension(&self, dimension: IdentityDimension) -> &GroupedCounts {
        match dimension {
            IdentityDimension::Version => &self.version,
            IdentityDimension::Build => &self.build,
            IdentityDimension::UtsVersion => &self.utsversion,
            IdentityDimension::PcModel => &self.pcmodel,
            IdentityDimension::PcYear => &self.pcyear,
            IdentityDimension::OsVersion => &self.osversion,
            IdentityDimension::Lang => &self.lang,
        }
    }

    /// Mutable flag counter.
    const fn flag_slot(&mut self, flag: IdentityFlag) -> &mut u64 {
        match flag {
            IdentityFlag::IsDeb => &mut self.isdeb,
            IdentityFlag::TrayEna => &mut self.trayena,
            IdentityFlag::WifiEna => &mut self.wifiena,
            IdentityFlag::DefaultOs => &mut self.defaultos,
            IdentityFlag::WeirdPc => &mut self.weirdpc,
        }
    }

    /// Mutable grouped counts.
    const fn dimension_slot(&mut self, dimension: IdentityDimension) -> &mut GroupedCounts {
        match dimension {
            IdentityDimension::Version => &mut self.version,
            IdentityDimension::Build => &mut self.build,
            IdentityDimension::UtsVersion => &mut self.utsversion,
            IdentityDimension::PcModel => &mut self.pcmodel,
            IdentityDimension::PcYear => &mut self.pcyear,
            IdentityDimension::OsVersion => &mut self.osversion,
            IdentityDimension::Lang => &mut self.lang,
        }
    }
}

/// Total, active, and outdated rollups.
///
/// # Invariants
/// - `active` and `outdated` partition `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedStats {
    /// Every non-ignored installation.
    pub total: SegmentStats,
    /// Installations seen within the activity window.
    pub active: SegmentStats,
    /// Installations not seen within the activity window.
    pub outdated: SegmentStats,
}

impl SegmentedStats {
    /// Folds one record into `total` and its activity bucket.
    pub fn add_record(&mut self, record: &IdentityRecord, cutoff: Timestamp) {
        self.total.add_record(record);
        match Activity::classify(record.lastrequest, cutoff) {
            Activity::Active => self.active.add_record(record),
            Activity::Outdated => self.outdated.add_record(record),
        }
    }
}

// ============================================================================
// SECTION: Global Sums
// ============================================================================

/// Feature-usage totals.
///
/// # Invariants
/// - `total` equals the sum of `per_action`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    /// Sum of all action counts.
    pub total: u64,
    /// Count per action across installations.
    pub per_action: BTreeMap<ActionName, u64>,
}

impl UsageStats {
    /// Builds usage stats from per-action sums.
    #[must_use]
    pub fn from_per_action(per_action: BTreeMap<ActionName, u64>) -> Self {
        let total = per_action.values().fold(0_u64, |acc, count| acc.saturating_add(*count));
        Self {
            total,
            per_action,
        }
    }
}

/// Occurrences of each value per check variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckStats(pub BTreeMap<CheckName, BTreeMap<String, u64>>);

impl CheckStats {
    /// Counts one installation reporting `label` for `name`.
    pub fn add(&mut self, name: &CheckName, label: String) {
        let slot = self.0.entry(name.clone()).or_default().entry(label).or_insert(0);
        *slot = slot.saturating_add(1);
    }

    /// Returns the count for a variable/value pair, zero when unseen.
    #[must_use]
    pub fn get(&self, name: &str, label: &str) -> u64 {
        self.0
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .and_then(|(_, values)| values.get(label).copied())
            .unwrap_or(0)
    }
}

/// Global launch sums, independent of segmentation.
///
/// # Invariants
/// - `total` equals `normal + tray`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchStats {
    /// All launches.
    pub total: u64,
    /// Normal launches.
    pub normal: u64,
    /// Tray launches.
    pub tray: u64,
}

impl From<LaunchCounts> for LaunchStats {
    fn from(counts: LaunchCounts) -> Self {
        Self {
            total: counts.total(),
            normal: counts.normal,
            tray: counts.tray,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::GroupKey;
    use super::GroupedCounts;
    use super::LaunchStats;
    use crate::core::records::LaunchCounts;

    #[test]
    fn missing_group_sorts_first_and_renders_undefined() {
        let mut counts = GroupedCounts::default();
        counts.add(Some("2.0"));
        counts.add(None);
        counts.add(Some("1.0"));
        counts.add(Some("2.0"));
        let keys: Vec<&str> = counts.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["undefined", "1.0", "2.0"]);
        assert_eq!(counts.get(&GroupKey::Value("2.0".to_string())), 2);
        assert_eq!(counts.total(), 4);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"undefined":1,"1.0":1,"2.0":2}"#);
    }

    #[test]
    fn launch_stats_total_is_sum() {
        let stats = LaunchStats::from(LaunchCounts {
            normal: 3,
            tray: 4,
        });
        assert_eq!(stats.total, 7);
    }
}
