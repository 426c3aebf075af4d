// crates/ut-stats-core/src/core/identifiers.rs
// ============================================================================
// Module: ut-stats Identifiers
// Description: Validated identifiers for installations, crashes, and labels.
// Purpose: Reject malformed keys before they can reach any store.
// Dependencies: serde, thiserror, uuid
// ============================================================================

//! ## Overview
//! Installation and crash identifiers are versioned UUIDs in canonical
//! hyphenated form. Action names and check variable names are open-vocabulary
//! labels restricted to a conservative character set. Every identifier here is
//! validated at construction and serializes as its canonical string.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Length of a canonical hyphenated UUID string.
const HYPHENATED_UUID_LENGTH: usize = 36;
/// Maximum length of an action or check label.
pub const MAX_LABEL_LENGTH: usize = 128;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Value is not a canonical versioned UUID.
    #[error("{field} is not a versioned uuid: {value:?}")]
    InvalidUuid {
        /// Wire field the value came from.
        field: &'static str,
        /// Rejected value (truncated).
        value: String,
    },
    /// Label is empty, too long, or contains disallowed characters.
    #[error("{field} is not a valid label: {value:?}")]
    InvalidLabel {
        /// Wire field the value came from.
        field: &'static str,
        /// Rejected value (truncated).
        value: String,
    },
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Installation identifier, the primary key across every store.
///
/// # Invariants
/// - Always a lowercase hyphenated UUID with version 1 through 8.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstallId(String);

impl InstallId {
    /// Parses an installation identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidUuid`] when the value is not a
    /// canonical versioned UUID.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        parse_versioned_uuid("id", value).map(Self)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for InstallId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<InstallId> for String {
    fn from(value: InstallId) -> Self {
        value.0
    }
}

/// Crash report identifier.
///
/// # Invariants
/// - Always a lowercase hyphenated UUID with version 1 through 8.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CrashId(String);

impl CrashId {
    /// Parses a crash identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidUuid`] when the value is not a
    /// canonical versioned UUID.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        parse_versioned_uuid("crashid", value).map(Self)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CrashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CrashId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CrashId> for String {
    fn from(value: CrashId) -> Self {
        value.0
    }
}

/// Feature-usage action label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionName(String);

impl ActionName {
    /// Parses an action label.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidLabel`] when the label is malformed.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        validate_label("action", value).map(|()| Self(value.to_string()))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for ActionName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ActionName> for String {
    fn from(value: ActionName) -> Self {
        value.0
    }
}

/// Check variable label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckName(String);

impl CheckName {
    /// Parses a check variable label.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidLabel`] when the label is malformed.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        validate_label("checks", value).map(|()| Self(value.to_string()))
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for CheckName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CheckName> for String {
    fn from(value: CheckName) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a canonical hyphenated UUID and returns its lowercase form.
fn parse_versioned_uuid(field: &'static str, value: &str) -> Result<String, IdentifierError> {
    let invalid = || IdentifierError::InvalidUuid {
        field,
        value: truncate_for_error(value),
    };
    if value.len() != HYPHENATED_UUID_LENGTH {
        return Err(invalid());
    }
    let parsed = Uuid::try_parse(value).map_err(|_| invalid())?;
    if parsed.is_nil() || !(1 ..= 8).contains(&parsed.get_version_num()) {
        return Err(invalid());
    }
    Ok(parsed.hyphenated().to_string())
}

/// Validates an open-vocabulary label.
fn validate_label(field: &'static str, value: &str) -> Result<(), IdentifierError> {
    let valid_chars = value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '-'));
    if value.is_empty() || value.len() > MAX_LABEL_LENGTH || !valid_chars {
        return Err(IdentifierError::InvalidLabel {
            field,
            value: truncate_for_error(value),
        });
    }
    Ok(())
}

/// Truncates rejected input so error messages stay bounded.
fn truncate_for_error(value: &str) -> String {
    value.chars().take(64).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
