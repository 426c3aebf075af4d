// crates/ut-stats-core/src/core/records.rs
// ============================================================================
// Module: ut-stats Records
// Description: Persisted identity, usage, crash, and check records.
// Purpose: Define the stored shapes and the identity merge rule.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Records are the durable state behind every store. Scalar identity
//! attributes are explicit optional fields so additive client fields never
//! require rewriting stored data. The identity merge rule lives here so every
//! backend applies the same semantics: scalars overwrite, launch counters only
//! ever increase, and `lastrequest` tracks the latest report.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::ActionName;
use crate::core::identifiers::CheckName;
use crate::core::identifiers::CrashId;
use crate::core::identifiers::InstallId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Launch Mode
// ============================================================================

/// How the application was started for a given report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Foreground launch.
    Normal,
    /// Background or minimized-to-tray launch.
    Tray,
}

impl LaunchMode {
    /// Maps a wire value to a launch mode; unknown values mean "no launch".
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "tray" => Some(Self::Tray),
            _ => None,
        }
    }
}

/// Monotonic launch counters for one installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCounts {
    /// Normal launches observed.
    pub normal: u64,
    /// Tray launches observed.
    pub tray: u64,
}

impl LaunchCounts {
    /// Returns the counter delta a single report contributes.
    #[must_use]
    pub const fn delta_for(mode: Option<LaunchMode>) -> Self {
        match mode {
            Some(LaunchMode::Normal) => Self {
                normal: 1,
                tray: 0,
            },
            Some(LaunchMode::Tray) => Self {
                normal: 0,
                tray: 1,
            },
            None => Self {
                normal: 0,
                tray: 0,
            },
        }
    }

    /// Adds a delta without ever decreasing either counter.
    pub const fn add(&mut self, delta: Self) {
        self.normal = self.normal.saturating_add(delta.normal);
        self.tray = self.tray.saturating_add(delta.tray);
    }

    /// Returns the sum of both counters.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.normal.saturating_add(self.tray)
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Scalar attributes reported by an installation.
///
/// # Invariants
/// - `None` means the client did not report the attribute on its latest report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAttributes {
    /// Application version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Build number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Product-suite version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utsversion: Option<String>,
    /// UI language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// Tray mode enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trayena: Option<bool>,
    /// Debug build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isdeb: Option<bool>,
    /// Wi-Fi sync enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifiena: Option<bool>,
    /// Machine model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcmodel: Option<String>,
    /// Machine model year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pcyear: Option<String>,
    /// Machine flagged as unusual by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weirdpc: Option<bool>,
    /// Running on the vendor default OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaultos: Option<bool>,
    /// OS version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osversion: Option<String>,
}

impl IdentityAttributes {
    /// Returns the value of a boolean flag.
    #[must_use]
    pub const fn flag(&self, flag: IdentityFlag) -> Option<bool> {
        match flag {
            IdentityFlag::IsDeb => self.isdeb,
            IdentityFlag::TrayEna => self.trayena,
            IdentityFlag::WifiEna => self.wifiena,
            IdentityFlag::DefaultOs => self.defaultos,
            IdentityFlag::WeirdPc => self.weirdpc,
        }
    }

    /// Returns the value of a grouped dimension.
    #[must_use]
    pub fn dimension(&self, dimension: IdentityDimension) -> Option<&str> {
        let value = match dimension {
            IdentityDimension::Version => &self.version,
            IdentityDimension::Build => &self.build,
            IdentityDimension::UtsVersion => &self.utsversion,
            IdentityDimension::PcModel => &self.pcmodel,
            IdentityDimension::PcYear => &self.pcyear,
            IdentityDimension::OsVersion => &self.osversion,
            IdentityDimension::Lang => &self.lang,
        };
        value.as_deref()
    }
}

/// Boolean identity attributes counted by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityFlag {
    /// `isdeb`.
    IsDeb,
    /// `trayena`.
    TrayEna,
    /// `wifiena`.
    WifiEna,
    /// `defaultos`.
    DefaultOs,
    /// `weirdpc`.
    WeirdPc,
}

impl IdentityFlag {
    /// Every flag in output order.
    pub const ALL: [Self; 5] =
        [Self::IsDeb, Self::TrayEna, Self::WifiEna, Self::DefaultOs, Self::WeirdPc];
}

/// Identity attributes grouped by distinct value in stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityDimension {
    /// `version`.
    Version,
    /// `build`.
    Build,
    /// `utsversion`.
    UtsVersion,
    /// `pcmodel`.
    PcModel,
    /// `pcyear`.
    PcYear,
    /// `osversion`.
    OsVersion,
    /// `lang`.
    Lang,
}

impl IdentityDimension {
    /// Every dimension in output order.
    pub const ALL: [Self; 7] = [
        Self::Version,
        Self::Build,
        Self::UtsVersion,
        Self::PcModel,
        Self::PcYear,
        Self::OsVersion,
        Self::Lang,
    ];
}

/// Latest known state of one installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Installation identifier.
    pub id: InstallId,
    /// Latest reported scalar attributes.
    #[serde(flatten)]
    pub attributes: IdentityAttributes,
    /// Accumulated launch counters.
    pub launch: LaunchCounts,
    /// Time of the latest report, absent for records imported without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastrequest: Option<Timestamp>,
}

impl IdentityRecord {
    /// Creates the lazily-seeded record for an unseen installation.
    #[must_use]
    pub fn new(id: InstallId) -> Self {
        Self {
            id,
            attributes: IdentityAttributes::default(),
            launch: LaunchCounts::default(),
            lastrequest: None,
        }
    }

    /// Merges a report into the record.
    ///
    /// Scalars are replaced wholesale, counters are incremented, and
    /// `lastrequest` is set to `at`.
    pub fn apply_report(
        &mut self,
        attributes: IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) {
        self.attributes = attributes;
        self.launch.add(LaunchCounts::delta_for(launch_mode));
        self.lastrequest = Some(at);
    }
}

// ============================================================================
// SECTION: Usage
// ============================================================================

/// Occurrence count for one (installation, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Installation identifier.
    pub id: InstallId,
    /// Action label.
    pub action: ActionName,
    /// Number of reports of this pair.
    pub count: u64,
}

// ============================================================================
// SECTION: Crashes
// ============================================================================

/// Structured crash metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashMetadata {
    /// Application version at crash time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Build number at crash time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    /// Product-suite version at crash time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utsversion: Option<String>,
    /// Debug build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isdeb: Option<bool>,
    /// Free-text crash message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Crash record keyed by (installation, crash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Installation identifier.
    pub id: InstallId,
    /// Crash identifier.
    pub crash_id: CrashId,
    /// Latest metadata for this crash.
    #[serde(flatten)]
    pub metadata: CrashMetadata,
    /// Time the metadata was last written.
    pub reported_at: Timestamp,
}

/// Raw crash log keyed by crash identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashLog {
    /// Crash identifier.
    pub crash_id: CrashId,
    /// Log text.
    pub text: String,
    /// Digest of `text`, verified on load by durable backends.
    pub digest: HashDigest,
    /// Time the log was last written.
    pub attached_at: Timestamp,
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Last reported value of a check variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(Number),
    /// Text value.
    Text(String),
}

impl CheckValue {
    /// Returns the grouping label used by check stats.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

/// Check record keyed by (installation, variable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Installation identifier.
    pub id: InstallId,
    /// Variable name.
    pub name: CheckName,
    /// Last reported value.
    pub value: CheckValue,
    /// Time the value was last written.
    pub updated_at: Timestamp,
}
