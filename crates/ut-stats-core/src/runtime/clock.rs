// crates/ut-stats-core/src/runtime/clock.rs
// ============================================================================
// Module: ut-stats Clocks
// Description: Wall-clock and fixed clock implementations.
// Purpose: Keep time injectable for ingest and aggregation.
// Dependencies: crate::core, crate::interfaces, time
// ============================================================================

//! ## Overview
//! Time is read through the [`Clock`] interface only. [`FixedClock`] is moved
//! by hand in tests; [`SharedClock`] erases any clock behind one clonable
//! handle for server state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::core::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_offset_datetime(OffsetDateTime::now_utc())
    }
}

// ============================================================================
// SECTION: Fixed Clock
// ============================================================================

/// Manually controlled clock for deterministic runs.
#[derive(Debug, Clone)]
pub struct FixedClock {
    /// Current reading, shared across clones.
    current: Arc<Mutex<Timestamp>>,
}

impl FixedClock {
    /// Creates a clock pinned at `at`.
    #[must_use]
    pub fn new(at: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(at)),
        }
    }

    /// Moves the clock to `at`.
    pub fn set(&self, at: Timestamp) {
        match self.current.lock() {
            Ok(mut guard) => *guard = at,
            Err(poisoned) => *poisoned.into_inner() = at,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        match self.current.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Shared Clock
// ============================================================================

/// Clonable handle over any clock.
#[derive(Clone)]
pub struct SharedClock {
    /// Clock implementation.
    inner: Arc<dyn Clock + Send + Sync>,
}

impl SharedClock {
    /// Wraps a concrete clock.
    #[must_use]
    pub fn from_clock(clock: impl Clock + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(clock),
        }
    }
}

impl std::fmt::Debug for SharedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClock").finish_non_exhaustive()
    }
}

impl Clock for SharedClock {
    fn now(&self) -> Timestamp {
        self.inner.now()
    }
}
