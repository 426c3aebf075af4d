// crates/ut-stats-core/src/core/time.rs
// ============================================================================
// Module: ut-stats Time Model
// Description: Second-precision UTC timestamps and the activity window.
// Purpose: Give stores and the aggregator one canonical time representation.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! Timestamps are UTC instants truncated to whole seconds and rendered as
//! RFC 3339 (`2026-10-17T08:30:00Z`). The core never reads wall-clock time
//! itself; hosts supply `now` through [`crate::interfaces::Clock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing and formatting errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    /// Value is not RFC 3339.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
    /// Value falls outside the supported calendar range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
    /// Value could not be rendered.
    #[error("timestamp format error: {0}")]
    Format(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC timestamp with second precision.
///
/// # Invariants
/// - Offset is always UTC and the sub-second part is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Builds a timestamp from any offset date-time, normalizing to UTC seconds.
    #[must_use]
    pub fn from_offset_datetime(value: OffsetDateTime) -> Self {
        let utc = value.to_offset(UtcOffset::UTC);
        Self(utc.replace_nanosecond(0).unwrap_or(utc))
    }

    /// Builds a timestamp from unix epoch seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the value is not representable.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, TimestampError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self::from_offset_datetime)
            .map_err(|err| TimestampError::OutOfRange(err.to_string()))
    }

    /// Parses an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when the value is not RFC 3339.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(value, &Rfc3339)
            .map(Self::from_offset_datetime)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Renders the timestamp as RFC 3339 in UTC.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Format`] for years RFC 3339 cannot express.
    pub fn to_rfc3339(&self) -> Result<String, TimestampError> {
        self.0.format(&Rfc3339).map_err(|err| TimestampError::Format(err.to_string()))
    }

    /// Returns unix epoch seconds.
    #[must_use]
    pub fn unix_seconds(&self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Returns the same wall-clock time one calendar month earlier.
    ///
    /// Days that do not exist in the previous month clamp to its last day.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] at the lower calendar bound.
    pub fn minus_one_month(&self) -> Result<Self, TimestampError> {
        let date = self.0.date();
        let (year, month) = if date.month() == Month::January {
            (date.year() - 1, Month::December)
        } else {
            (date.year(), date.month().previous())
        };
        let mut day = date.day();
        let target = loop {
            match Date::from_calendar_date(year, month, day) {
                Ok(target) => break target,
                Err(_) if day > 28 => day -= 1,
                Err(err) => return Err(TimestampError::OutOfRange(err.to_string())),
            }
        };
        Ok(Self(self.0.replace_date(target)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "@{}", self.unix_seconds()),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.to_rfc3339().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse_rfc3339(&text).map_err(serde::de::Error::custom)
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

    use time::macros::datetime;

    use super::Timestamp;

    #[test]
    fn renders_second_precision_utc() {
        let ts = Timestamp::from_offset_datetime(datetime!(2026-10-17 10:30:05.987 +02:00));
        assert_eq!(ts.to_rfc3339().unwrap(), "2026-10-17T08:30:05Z");
    }

    #[test]
    fn parse_round_trips_rendered_form() {
        let ts = Timestamp::parse_rfc3339("2026-01-02T03:04:05Z").unwrap();
        assert_eq!(ts.to_rfc3339().unwrap(), "2026-01-02T03:04:05Z");
    }

    #[test]
    fn minus_one_month_keeps_day_when_present() {
        let ts = Timestamp::parse_rfc3339("2026-10-17T12:00:00Z").unwrap();
        assert_eq!(ts.minus_one_month().unwrap().to_rfc3339().unwrap(), "2026-09-17T12:00:00Z");
    }

    #[test]
    fn minus_one_month_wraps_year() {
        let ts = Timestamp::parse_rfc3339("2026-01-15T00:00:00Z").unwrap();
        assert_eq!(ts.minus_one_month().unwrap().to_rfc3339().unwrap(), "2025-12-15T00:00:00Z");
    }

    #[test]
    fn minus_one_month_clamps_short_months() {
        let ts = Timestamp::parse_rfc3339("2026-03-31T06:00:00Z").unwrap();
        assert_eq!(ts.minus_one_month().unwrap().to_rfc3339().unwrap(), "2026-02-28T06:00:00Z");
        let leap = Timestamp::parse_rfc3339("2028-03-31T06:00:00Z").unwrap();
        assert_eq!(leap.minus_one_month().unwrap().to_rfc3339().unwrap(), "2028-02-29T06:00:00Z");
    }
}
