// crates/ut-stats-core/tests/concurrency.rs
// ============================================================================
// Module: Concurrency Tests
// Description: Lost-update checks for the in-memory backend.
// ============================================================================
//! ## Overview
//! Many threads report launches and usage for one installation; every
//! increment must be reflected in the final counts. Threads writing distinct
//! installations must all land, and scans must stay in key order.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::thread;

use ut_stats_core::ActionName;
use ut_stats_core::IdentityAttributes;
use ut_stats_core::IdentityStore;
use ut_stats_core::InMemoryTelemetryStore;
use ut_stats_core::InstallId;
use ut_stats_core::LaunchMode;
use ut_stats_core::SharedTelemetryStore;
use ut_stats_core::Timestamp;
use ut_stats_core::UsageStore;

const THREADS: usize = 8;
const PER_THREAD: usize = 250;

#[test]
fn concurrent_launch_reports_never_lose_increments() {
    let store = SharedTelemetryStore::from_store(InMemoryTelemetryStore::new());
    let id = InstallId::parse("11111111-1111-1111-1111-111111111111").unwrap();
    let at = Timestamp::parse_rfc3339("2026-10-17T00:00:00Z").unwrap();

    let handles: Vec<_> = (0 .. THREADS)
        .map(|index| {
            let store = store.clone();
            let id = id.clone();
            let mode = if index % 2 == 0 { LaunchMode::Tray } else { LaunchMode::Normal };
            thread::spawn(move || {
                for _ in 0 .. PER_THREAD {
                    store
                        .upsert_identity(&id, IdentityAttributes::default(), Some(mode), at)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let record = store.load_identity(&id).unwrap().unwrap();
    let expected = (THREADS / 2 * PER_THREAD) as u64;
    assert_eq!(record.launch.tray, expected);
    assert_eq!(record.launch.normal, expected);
}

#[test]
fn concurrent_usage_reports_never_lose_increments() {
    let store = SharedTelemetryStore::from_store(InMemoryTelemetryStore::new());
    let id = InstallId::parse("11111111-1111-1111-1111-111111111111").unwrap();
    let action = ActionName::parse("open").unwrap();

    thread::scope(|scope| {
        for _ in 0 .. THREADS {
            scope.spawn(|| {
                for _ in 0 .. PER_THREAD {
                    store.increment_usage(&id, &action).unwrap();
                }
            });
        }
    });

    let sums = store.sum_usage_by_action().unwrap();
    assert_eq!(sums.get(&action).copied(), Some((THREADS * PER_THREAD) as u64));
}

#[test]
fn concurrent_reports_for_distinct_installs_all_land_in_order() {
    let store = InMemoryTelemetryStore::new();
    let action = ActionName::parse("open").unwrap();
    let at = Timestamp::parse_rfc3339("2026-10-17T00:00:00Z").unwrap();
    let ids_per_thread = 64;

    thread::scope(|scope| {
        for thread_index in 0 .. THREADS {
            let store = store.clone();
            let action = action.clone();
            scope.spawn(move || {
                for offset in 0 .. ids_per_thread {
                    let n = thread_index * ids_per_thread + offset;
                    let id = InstallId::parse(&format!("{n:08x}-0000-4000-8000-{n:012x}")).unwrap();
                    store
                        .upsert_identity(&id, IdentityAttributes::default(), None, at)
                        .unwrap();
                    store.increment_usage(&id, &action).unwrap();
                }
            });
        }
    });

    let identities = store.scan_identities().unwrap();
    assert_eq!(identities.len(), THREADS * ids_per_thread);
    assert!(identities.windows(2).all(|pair| pair[0].id < pair[1].id));

    let usage = store.scan_usage().unwrap();
    assert_eq!(usage.len(), THREADS * ids_per_thread);
    assert!(usage.iter().all(|record| record.count == 1));
    assert!(usage.windows(2).all(|pair| pair[0].id < pair[1].id));
}
