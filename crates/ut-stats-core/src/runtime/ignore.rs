// crates/ut-stats-core/src/runtime/ignore.rs
// ============================================================================
// Module: ut-stats Ignore List
// Description: Static set of installations excluded from stats.
// Purpose: Parse and hold the operator-maintained ignore list.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The list text format is one installation identifier per line. Blank lines
//! and lines starting with `#` are skipped; anything else must parse as an
//! installation identifier or the whole list is rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::IdentifierError;
use crate::core::InstallId;
use crate::interfaces::IgnoreList;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ignore-list parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IgnoreListError {
    /// A line is not a valid installation identifier.
    #[error("ignore list line {line}: {source}")]
    InvalidEntry {
        /// One-based line number.
        line: usize,
        /// Underlying identifier error.
        source: IdentifierError,
    },
}

// ============================================================================
// SECTION: Static Ignore List
// ============================================================================

/// Immutable ignore list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIgnoreList {
    /// Excluded installations.
    ids: BTreeSet<InstallId>,
}

impl StaticIgnoreList {
    /// Builds a list from identifiers.
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = InstallId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Parses the line-oriented list format.
    ///
    /// # Errors
    ///
    /// Returns [`IgnoreListError::InvalidEntry`] for the first malformed line.
    pub fn parse(text: &str) -> Result<Self, IgnoreListError> {
        let mut ids = BTreeSet::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let id = InstallId::parse(line).map_err(|source| IgnoreListError::InvalidEntry {
                line: index + 1,
                source,
            })?;
            ids.insert(id);
        }
        Ok(Self {
            ids,
        })
    }

    /// Adds every identifier from another list.
    pub fn extend(&mut self, other: Self) {
        self.ids.extend(other.ids);
    }

    /// Returns the number of excluded installations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when nothing is excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl IgnoreList for StaticIgnoreList {
    fn contains(&self, id: &InstallId) -> bool {
        self.ids.contains(id)
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

    use super::IgnoreListError;
    use super::StaticIgnoreList;
    use crate::core::InstallId;
    use crate::interfaces::IgnoreList;

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let list = StaticIgnoreList::parse(
            "# qa devices\n\n11111111-1111-1111-1111-111111111111\n  \
             9F1C2A34-5B6D-4E7F-8A9B-0C1D2E3F4A5B  \n",
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        let id = InstallId::parse("9f1c2a34-5b6d-4e7f-8a9b-0c1d2e3f4a5b").unwrap();
        assert!(list.contains(&id));
    }

    #[test]
    fn parse_reports_the_bad_line() {
        let err = StaticIgnoreList::parse("11111111-1111-1111-1111-111111111111\nbogus\n")
            .unwrap_err();
        assert!(matches!(err, IgnoreListError::InvalidEntry { line: 2, .. }));
    }
}
