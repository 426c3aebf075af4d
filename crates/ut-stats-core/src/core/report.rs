// crates/ut-stats-core/src/core/report.rs
// ============================================================================
// Module: ut-stats Report Ingress
// Description: Allow-list parsing of client telemetry reports.
// Purpose: Turn attacker-controlled JSON into typed, validated reports.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every report kind declares the exact set of top-level keys it recognizes.
//! Parsing first rejects any key that names object-prototype machinery, then
//! drops unrecognized keys, then validates the remaining fields. Nothing
//! outside an allow-list ever reaches a store.
//! Security posture: report bodies are untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ActionName;
use crate::core::identifiers::CheckName;
use crate::core::identifiers::CrashId;
use crate::core::identifiers::IdentifierError;
use crate::core::identifiers::InstallId;
use crate::core::records::CheckValue;
use crate::core::records::CrashMetadata;
use crate::core::records::IdentityAttributes;
use crate::core::records::LaunchMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Keys that collide with object-prototype machinery in client runtimes.
pub const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];
/// Maximum length of a scalar text attribute.
pub const MAX_ATTRIBUTE_LENGTH: usize = 256;
/// Maximum length of a crash message.
pub const MAX_MESSAGE_LENGTH: usize = 16 * 1024;
/// Maximum number of check variables in one report.
pub const MAX_CHECKS_PER_REPORT: usize = 256;

/// Recognized keys for identity reports.
const IDENTITY_FIELDS: &[&str] = &[
    "id",
    "version",
    "build",
    "utsversion",
    "lang",
    "launchmode",
    "launchmod",
    "trayena",
    "isdeb",
    "wifiena",
    "pcmodel",
    "pcyear",
    "weirdpc",
    "defaultos",
    "osversion",
];
/// Recognized keys for usage reports.
const USAGE_FIELDS: &[&str] = &["id", "action"];
/// Recognized keys for crash reports.
const CRASH_FIELDS: &[&str] =
    &["id", "crashid", "version", "build", "utsversion", "isdeb", "message"];
/// Recognized keys for crash log uploads.
const CRASH_LOG_FIELDS: &[&str] = &["crashid", "log"];
/// Recognized keys for check reports.
const CHECK_FIELDS: &[&str] = &["id", "checks"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Report validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// `id` or `crashid` is not a well-formed identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(IdentifierError),
    /// Fields are missing or have the wrong shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// A key names object-prototype machinery.
    #[error("reserved key in payload: {field}")]
    ProtoPollutionAttempt {
        /// Offending key.
        field: String,
    },
}

impl ReportError {
    /// Returns a stable label for logs and error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::ProtoPollutionAttempt {
                ..
            } => "proto_pollution_attempt",
        }
    }
}

impl From<IdentifierError> for ReportError {
    fn from(error: IdentifierError) -> Self {
        match error {
            IdentifierError::InvalidUuid {
                ..
            } => Self::InvalidIdentifier(error),
            IdentifierError::InvalidLabel {
                ..
            } => Self::MalformedPayload(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Report Types
// ============================================================================

/// Identity report: attributes plus an optional launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReport {
    /// Installation identifier.
    pub id: InstallId,
    /// Full set of scalar attributes (absent ones are `None`).
    pub attributes: IdentityAttributes,
    /// Launch mode, when the report records a launch.
    pub launch_mode: Option<LaunchMode>,
}

impl IdentityReport {
    /// Parses an identity report from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Self::from_json(&parse_body(bytes)?)
    }

    /// Parses an identity report from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_json(value: &Value) -> Result<Self, ReportError> {
        let fields = ReportFields::new(value, IDENTITY_FIELDS)?;
        let id = InstallId::parse(fields.required_str("id")?)?;
        let launch_text = match fields.optional_text("launchmode", MAX_ATTRIBUTE_LENGTH)? {
            Some(text) => Some(text),
            None => fields.optional_text("launchmod", MAX_ATTRIBUTE_LENGTH)?,
        };
        let attributes = IdentityAttributes {
            version: fields.optional_text("version", MAX_ATTRIBUTE_LENGTH)?,
            build: fields.optional_text("build", MAX_ATTRIBUTE_LENGTH)?,
            utsversion: fields.optional_text("utsversion", MAX_ATTRIBUTE_LENGTH)?,
            lang: fields.optional_text("lang", MAX_ATTRIBUTE_LENGTH)?,
            trayena: fields.optional_bool("trayena")?,
            isdeb: fields.optional_bool("isdeb")?,
            wifiena: fields.optional_bool("wifiena")?,
            pcmodel: fields.optional_text("pcmodel", MAX_ATTRIBUTE_LENGTH)?,
            pcyear: fields.optional_text("pcyear", MAX_ATTRIBUTE_LENGTH)?,
            weirdpc: fields.optional_bool("weirdpc")?,
            defaultos: fields.optional_bool("defaultos")?,
            osversion: fields.optional_text("osversion", MAX_ATTRIBUTE_LENGTH)?,
        };
        Ok(Self {
            id,
            attributes,
            launch_mode: launch_text.as_deref().and_then(LaunchMode::from_wire),
        })
    }
}

/// Feature-usage report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Installation identifier.
    pub id: InstallId,
    /// Action label.
    pub action: ActionName,
}

impl UsageReport {
    /// Parses a usage report from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Self::from_json(&parse_body(bytes)?)
    }

    /// Parses a usage report from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_json(value: &Value) -> Result<Self, ReportError> {
        let fields = ReportFields::new(value, USAGE_FIELDS)?;
        Ok(Self {
            id: InstallId::parse(fields.required_str("id")?)?,
            action: ActionName::parse(fields.required_str("action")?)?,
        })
    }
}

/// Crash metadata report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    /// Installation identifier.
    pub id: InstallId,
    /// Crash identifier.
    pub crash_id: CrashId,
    /// Crash metadata.
    pub metadata: CrashMetadata,
}

impl CrashReport {
    /// Parses a crash report from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Self::from_json(&parse_body(bytes)?)
    }

    /// Parses a crash report from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_json(value: &Value) -> Result<Self, ReportError> {
        let fields = ReportFields::new(value, CRASH_FIELDS)?;
        let id = InstallId::parse(fields.required_str("id")?)?;
        let crash_id = CrashId::parse(fields.required_str("crashid")?)?;
        let metadata = CrashMetadata {
            version: fields.optional_text("version", MAX_ATTRIBUTE_LENGTH)?,
            build: fields.optional_text("build", MAX_ATTRIBUTE_LENGTH)?,
            utsversion: fields.optional_text("utsversion", MAX_ATTRIBUTE_LENGTH)?,
            isdeb: fields.optional_bool("isdeb")?,
            message: fields.optional_text("message", MAX_MESSAGE_LENGTH)?,
        };
        Ok(Self {
            id,
            crash_id,
            metadata,
        })
    }
}

/// Crash log upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashLogReport {
    /// Crash identifier the log belongs to.
    pub crash_id: CrashId,
    /// Raw log text.
    pub text: String,
}

impl CrashLogReport {
    /// Parses a crash log upload from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Self::from_json(&parse_body(bytes)?)
    }

    /// Parses a crash log upload from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_json(value: &Value) -> Result<Self, ReportError> {
        let fields = ReportFields::new(value, CRASH_LOG_FIELDS)?;
        Ok(Self {
            crash_id: CrashId::parse(fields.required_str("crashid")?)?,
            text: fields.required_str("log")?.to_string(),
        })
    }
}

/// Check-variable report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Installation identifier.
    pub id: InstallId,
    /// Variable values to record.
    pub checks: BTreeMap<CheckName, CheckValue>,
}

impl CheckReport {
    /// Parses a check report from raw JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Self::from_json(&parse_body(bytes)?)
    }

    /// Parses a check report from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] when the payload fails validation.
    pub fn from_json(value: &Value) -> Result<Self, ReportError> {
        let fields = ReportFields::new(value, CHECK_FIELDS)?;
        let id = InstallId::parse(fields.required_str("id")?)?;
        let Some(Value::Object(raw_checks)) = fields.get("checks") else {
            return Err(ReportError::MalformedPayload("checks must be an object".to_string()));
        };
        reject_reserved_keys(raw_checks)?;
        if raw_checks.len() > MAX_CHECKS_PER_REPORT {
            return Err(ReportError::MalformedPayload(format!(
                "too many checks: {} (max {MAX_CHECKS_PER_REPORT})",
                raw_checks.len()
            )));
        }
        let mut checks = BTreeMap::new();
        for (name, raw_value) in raw_checks {
            let name = CheckName::parse(name)?;
            let value = match raw_value {
                Value::Bool(flag) => CheckValue::Bool(*flag),
                Value::Number(number) => CheckValue::Number(number.clone()),
                Value::String(text) if text.len() <= MAX_ATTRIBUTE_LENGTH => {
                    CheckValue::Text(text.clone())
                }
                _ => {
                    return Err(ReportError::MalformedPayload(format!(
                        "check {name} must be a boolean, number, or short string"
                    )));
                }
            };
            checks.insert(name, value);
        }
        Ok(Self {
            id,
            checks,
        })
    }
}

// ============================================================================
// SECTION: Field Access
// ============================================================================

/// Allow-listed view over a report object.
struct ReportFields<'a> {
    /// Recognized fields only.
    fields: BTreeMap<&'a str, &'a Value>,
}

impl<'a> ReportFields<'a> {
    /// Validates the report shape and keeps only allow-listed keys.
    fn new(value: &'a Value, allowed: &[&str]) -> Result<Self, ReportError> {
        let Value::Object(map) = value else {
            return Err(ReportError::MalformedPayload("report must be a json object".to_string()));
        };
        reject_reserved_keys(map)?;
        let fields = map
            .iter()
            .filter(|(key, _)| allowed.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str(), value))
            .collect();
        Ok(Self {
            fields,
        })
    }

    /// Returns a recognized field.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field).copied()
    }

    /// Returns a required string field.
    fn required_str(&self, field: &str) -> Result<&'a str, ReportError> {
        match self.get(field) {
            Some(Value::String(text)) => Ok(text.as_str()),
            Some(_) => Err(ReportError::MalformedPayload(format!("{field} must be a string"))),
            None => Err(ReportError::MalformedPayload(format!("missing field {field}"))),
        }
    }

    /// Returns an optional text attribute; numbers are kept in JSON text form.
    fn optional_text(&self, field: &str, max_len: usize) -> Result<Option<String>, ReportError> {
        let text = match self.get(field) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(text)) if text == "undefined" => return Ok(None),
            Some(Value::String(text)) => text.clone(),
            Some(Value::Number(number)) => number.to_string(),
            Some(_) => {
                return Err(ReportError::MalformedPayload(format!(
                    "{field} must be a string or number"
                )));
            }
        };
        if text.len() > max_len {
            return Err(ReportError::MalformedPayload(format!(
                "{field} exceeds {max_len} bytes"
            )));
        }
        Ok(Some(text))
    }

    /// Returns an optional boolean attribute.
    fn optional_bool(&self, field: &str) -> Result<Option<bool>, ReportError> {
        match self.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(Value::String(text)) if text == "true" => Ok(Some(true)),
            Some(Value::String(text)) if text == "false" => Ok(Some(false)),
            Some(Value::String(text)) if text == "undefined" => Ok(None),
            Some(_) => Err(ReportError::MalformedPayload(format!("{field} must be a boolean"))),
        }
    }
}

/// Parses a request body as JSON.
fn parse_body(bytes: &[u8]) -> Result<Value, ReportError> {
    serde_json::from_slice(bytes)
        .map_err(|err| ReportError::MalformedPayload(format!("invalid json: {err}")))
}

/// Fails when any key names object-prototype machinery.
fn reject_reserved_keys(map: &Map<String, Value>) -> Result<(), ReportError> {
    match map.keys().find(|key| RESERVED_KEYS.contains(&key.as_str())) {
        Some(key) => Err(ReportError::ProtoPollutionAttempt {
            field: key.clone(),
        }),
        None => Ok(()),
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

    use serde_json::json;

    use super::CheckReport;
    use super::CrashLogReport;
    use super::CrashReport;
    use super::IdentityReport;
    use super::ReportError;
    use super::UsageReport;
    use crate::core::records::CheckValue;
    use crate::core::records::IdentityAttributes;
    use crate::core::records::LaunchMode;

    const ID: &str = "9f1c2a34-5b6d-4e7f-8a9b-0c1d2e3f4a5b";
    const CRASH: &str = "11111111-1111-4111-8111-111111111111";

    #[test]
    fn identity_report_reads_recognized_fields() {
        let report = IdentityReport::from_json(&json!({
            "id": ID,
            "version": "2.1.0",
            "build": 412,
            "lang": "en",
            "launchmode": "tray",
            "trayena": "true",
            "isdeb": false,
            "pcyear": "undefined",
        }))
        .unwrap();
        assert_eq!(report.id.as_str(), ID);
        assert_eq!(report.attributes.version.as_deref(), Some("2.1.0"));
        assert_eq!(report.attributes.build.as_deref(), Some("412"));
        assert_eq!(report.attributes.trayena, Some(true));
        assert_eq!(report.attributes.isdeb, Some(false));
        assert_eq!(report.attributes.pcyear, None);
        assert_eq!(report.launch_mode, Some(LaunchMode::Tray));
    }

    #[test]
    fn identity_report_accepts_launchmod_alias() {
        let report = IdentityReport::from_json(&json!({"id": ID, "launchmod": "normal"})).unwrap();
        assert_eq!(report.launch_mode, Some(LaunchMode::Normal));
    }

    #[test]
    fn unknown_launch_mode_records_no_launch() {
        let report = IdentityReport::from_json(&json!({"id": ID, "launchmode": "cli"})).unwrap();
        assert_eq!(report.launch_mode, None);
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let report =
            IdentityReport::from_json(&json!({"id": ID, "lastrequest": "x", "launch": 9})).unwrap();
        assert_eq!(report.attributes, IdentityAttributes::default());
    }

    #[test]
    fn reserved_keys_are_rejected_before_other_validation() {
        let err = IdentityReport::from_json(&json!({"id": "junk", "__proto__": {"admin": true}}))
            .unwrap_err();
        assert_eq!(
            err,
            ReportError::ProtoPollutionAttempt {
                field: "__proto__".to_string()
            }
        );
        let err =
            UsageReport::from_slice(br#"{"constructor": 1, "id": 1, "action": "x"}"#).unwrap_err();
        assert_eq!(err.kind(), "proto_pollution_attempt");
    }

    #[test]
    fn reserved_check_names_are_rejected() {
        let err = CheckReport::from_json(&json!({"id": ID, "checks": {"prototype": true}}))
            .unwrap_err();
        assert_eq!(err.kind(), "proto_pollution_attempt");
    }

    #[test]
    fn invalid_id_maps_to_invalid_identifier() {
        let err = UsageReport::from_json(&json!({"id": "not-a-uuid", "action": "open"}))
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_identifier");
    }

    #[test]
    fn shape_errors_map_to_malformed_payload() {
        assert_eq!(IdentityReport::from_slice(b"[1,2]").unwrap_err().kind(), "malformed_payload");
        assert_eq!(IdentityReport::from_slice(b"{oops").unwrap_err().kind(), "malformed_payload");
        assert_eq!(
            IdentityReport::from_json(&json!({"version": "1"})).unwrap_err().kind(),
            "malformed_payload"
        );
        assert_eq!(
            IdentityReport::from_json(&json!({"id": 7})).unwrap_err().kind(),
            "malformed_payload"
        );
        assert_eq!(
            IdentityReport::from_json(&json!({"id": ID, "isdeb": "yes"})).unwrap_err().kind(),
            "malformed_payload"
        );
        assert_eq!(
            UsageReport::from_json(&json!({"id": ID, "action": "has space"})).unwrap_err().kind(),
            "malformed_payload"
        );
    }

    #[test]
    fn crash_reports_require_both_identifiers() {
        let report = CrashReport::from_json(&json!({
            "id": ID,
            "crashid": CRASH,
            "message": "boom",
            "isdeb": true,
        }))
        .unwrap();
        assert_eq!(report.crash_id.as_str(), CRASH);
        assert_eq!(report.metadata.message.as_deref(), Some("boom"));
        let err = CrashReport::from_json(&json!({"id": ID, "crashid": "x"})).unwrap_err();
        assert_eq!(err.kind(), "invalid_identifier");
    }

    #[test]
    fn crash_log_requires_text() {
        let log = CrashLogReport::from_json(&json!({"crashid": CRASH, "log": "line\n"})).unwrap();
        assert_eq!(log.text, "line\n");
        let err = CrashLogReport::from_json(&json!({"crashid": CRASH})).unwrap_err();
        assert_eq!(err.kind(), "malformed_payload");
    }

    #[test]
    fn check_report_keeps_scalar_values() {
        let report = CheckReport::from_json(&json!({
            "id": ID,
            "checks": {"darkmode": true, "volume": 3, "theme": "blue"},
        }))
        .unwrap();
        assert_eq!(report.checks.len(), 3);
        let values: Vec<String> = report.checks.values().map(CheckValue::label).collect();
        assert_eq!(values, vec!["true", "blue", "3"]);
        let err = CheckReport::from_json(&json!({"id": ID, "checks": {"nested": {}}}))
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_payload");
    }
}
