// crates/ut-stats-core/src/runtime/store.rs
// ============================================================================
// Module: ut-stats In-Memory Store
// Description: Lock-sharded in-memory telemetry store and a shared handle.
// Purpose: Back tests and local runs; give hosts one clonable store type.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Every record family is an ordered map split across lock shards selected by
//! key hash. Writes to different installations usually land on different
//! shards and proceed in parallel; writes to the same key serialize on that
//! key's shard. Every trait call holds one shard lock only for its own
//! read-modify-write. Scans lock shards one at a time, so a scan sees each
//! record whole but not a cross-record snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::hash::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ActionName;
use crate::core::CheckName;
use crate::core::CheckRecord;
use crate::core::CheckValue;
use crate::core::CrashId;
use crate::core::CrashLog;
use crate::core::CrashRecord;
use crate::core::IdentityAttributes;
use crate::core::IdentityRecord;
use crate::core::InstallId;
use crate::core::LaunchMode;
use crate::core::Timestamp;
use crate::core::UsageRecord;
use crate::interfaces::CheckStore;
use crate::interfaces::CrashStore;
use crate::interfaces::IdentityStore;
use crate::interfaces::StoreError;
use crate::interfaces::TelemetryStore;
use crate::interfaces::UsageStore;

// ============================================================================
// SECTION: Sharded Map
// ============================================================================

/// Lock shards per record family.
const SHARD_COUNT: u64 = 16;

/// Ordered map split across independently locked shards.
///
/// # Invariants
/// - A key only ever lives in the shard its hash selects.
#[derive(Debug)]
struct ShardedMap<K, V> {
    /// Shards indexed by key hash modulo [`SHARD_COUNT`].
    shards: Vec<Mutex<BTreeMap<K, V>>>,
}

impl<K, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self {
            shards: (0 .. SHARD_COUNT).map(|_| Mutex::new(BTreeMap::new())).collect(),
        }
    }
}

impl<K: Ord + Hash + Clone, V: Clone> ShardedMap<K, V> {
    /// Locks the shard owning `key`.
    fn shard(&self, key: &K) -> Result<MutexGuard<'_, BTreeMap<K, V>>, StoreError> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = usize::try_from(hasher.finish() % SHARD_COUNT).unwrap_or(0);
        let shard = self
            .shards
            .get(index)
            .ok_or_else(|| StoreError::Store("shard index out of range".to_string()))?;
        lock(shard)
    }

    /// Returns every entry in key order.
    fn snapshot(&self) -> Result<Vec<(K, V)>, StoreError> {
        let mut merged = BTreeMap::new();
        for shard in &self.shards {
            for (key, value) in lock(shard)?.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        Ok(merged.into_iter().collect())
    }
}

/// Acquires a store lock, mapping poisoning to a store error.
fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Store("mutex poisoned".to_string()))
}

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// In-memory telemetry store; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTelemetryStore {
    /// Identity records by installation.
    identities: Arc<ShardedMap<InstallId, IdentityRecord>>,
    /// Usage counts by (installation, action).
    usage: Arc<ShardedMap<(InstallId, ActionName), u64>>,
    /// Crash metadata by (installation, crash).
    crashes: Arc<ShardedMap<(InstallId, CrashId), CrashRecord>>,
    /// Crash logs by crash.
    crash_logs: Arc<ShardedMap<CrashId, CrashLog>>,
    /// Check records by (installation, variable).
    checks: Arc<ShardedMap<(InstallId, CheckName), CheckRecord>>,
}

impl InMemoryTelemetryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an identity record verbatim, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store lock is poisoned.
    pub fn import_identity(&self, record: IdentityRecord) -> Result<(), StoreError> {
        self.identities.shard(&record.id)?.insert(record.id.clone(), record);
        Ok(())
    }
}

impl IdentityStore for InMemoryTelemetryStore {
    fn upsert_identity(
        &self,
        id: &InstallId,
        attributes: IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) -> Result<IdentityRecord, StoreError> {
        let mut guard = self.identities.shard(id)?;
        let record = guard.entry(id.clone()).or_insert_with(|| IdentityRecord::new(id.clone()));
        record.apply_report(attributes, launch_mode, at);
        Ok(record.clone())
    }

    fn load_identity(&self, id: &InstallId) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.identities.shard(id)?.get(id).cloned())
    }

    fn scan_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        Ok(self.identities.snapshot()?.into_iter().map(|(_, record)| record).collect())
    }
}

impl UsageStore for InMemoryTelemetryStore {
    fn increment_usage(&self, id: &InstallId, action: &ActionName) -> Result<u64, StoreError> {
        let key = (id.clone(), action.clone());
        let mut guard = self.usage.shard(&key)?;
        let slot = guard.entry(key).or_insert(0);
        *slot = slot.saturating_add(1);
        Ok(*slot)
    }

    fn scan_usage(&self) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self
            .usage
            .snapshot()?
            .into_iter()
            .map(|((id, action), count)| UsageRecord {
                id,
                action,
                count,
            })
            .collect())
    }
}

impl CrashStore for InMemoryTelemetryStore {
    fn put_crash(&self, record: &CrashRecord) -> Result<(), StoreError> {
        let key = (record.id.clone(), record.crash_id.clone());
        self.crashes.shard(&key)?.insert(key, record.clone());
        Ok(())
    }

    fn load_crash(
        &self,
        id: &InstallId,
        crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, StoreError> {
        let key = (id.clone(), crash_id.clone());
        Ok(self.crashes.shard(&key)?.get(&key).cloned())
    }

    fn put_crash_log(&self, log: &CrashLog) -> Result<(), StoreError> {
        self.crash_logs.shard(&log.crash_id)?.insert(log.crash_id.clone(), log.clone());
        Ok(())
    }

    fn load_crash_log(&self, crash_id: &CrashId) -> Result<Option<CrashLog>, StoreError> {
        Ok(self.crash_logs.shard(crash_id)?.get(crash_id).cloned())
    }
}

impl CheckStore for InMemoryTelemetryStore {
    fn put_checks(
        &self,
        id: &InstallId,
        checks: &BTreeMap<CheckName, CheckValue>,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        for (name, value) in checks {
            let key = (id.clone(), name.clone());
            self.checks.shard(&key)?.insert(
                key,
                CheckRecord {
                    id: id.clone(),
                    name: name.clone(),
                    value: value.clone(),
                    updated_at: at,
                },
            );
        }
        Ok(())
    }

    fn scan_checks(&self) -> Result<Vec<CheckRecord>, StoreError> {
        Ok(self.checks.snapshot()?.into_iter().map(|(_, record)| record).collect())
    }
}

impl TelemetryStore for InMemoryTelemetryStore {}

// ============================================================================
// SECTION: Shared Store
// ============================================================================

/// Clonable handle over any telemetry store backend.
#[derive(Clone)]
pub struct SharedTelemetryStore {
    /// Backend implementation.
    inner: Arc<dyn TelemetryStore + Send + Sync>,
}

impl SharedTelemetryStore {
    /// Wraps a concrete store.
    #[must_use]
    pub fn from_store(store: impl TelemetryStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl std::fmt::Debug for SharedTelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTelemetryStore").finish_non_exhaustive()
    }
}

impl IdentityStore for SharedTelemetryStore {
    fn upsert_identity(
        &self,
        id: &InstallId,
        attributes: IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) -> Result<IdentityRecord, StoreError> {
        self.inner.upsert_identity(id, attributes, launch_mode, at)
    }

    fn load_identity(&self, id: &InstallId) -> Result<Option<IdentityRecord>, StoreError> {
        self.inner.load_identity(id)
    }

    fn scan_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        self.inner.scan_identities()
    }
}

impl UsageStore for SharedTelemetryStore {
    fn increment_usage(&self, id: &InstallId, action: &ActionName) -> Result<u64, StoreError> {
        self.inner.increment_usage(id, action)
    }

    fn scan_usage(&self) -> Result<Vec<UsageRecord>, StoreError> {
        self.inner.scan_usage()
    }

    fn sum_usage_by_action(&self) -> Result<BTreeMap<ActionName, u64>, StoreError> {
        self.inner.sum_usage_by_action()
    }
}

impl CrashStore for SharedTelemetryStore {
    fn put_crash(&self, record: &CrashRecord) -> Result<(), StoreError> {
        self.inner.put_crash(record)
    }

    fn load_crash(
        &self,
        id: &InstallId,
        crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, StoreError> {
        self.inner.load_crash(id, crash_id)
    }

    fn put_crash_log(&self, log: &CrashLog) -> Result<(), StoreError> {
        self.inner.put_crash_log(log)
    }

    fn load_crash_log(&self, crash_id: &CrashId) -> Result<Option<CrashLog>, StoreError> {
        self.inner.load_crash_log(crash_id)
    }
}

impl CheckStore for SharedTelemetryStore {
    fn put_checks(
        &self,
        id: &InstallId,
        checks: &BTreeMap<CheckName, CheckValue>,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.inner.put_checks(id, checks, at)
    }

    fn scan_checks(&self) -> Result<Vec<CheckRecord>, StoreError> {
        self.inner.scan_checks()
    }
}

impl TelemetryStore for SharedTelemetryStore {
    fn readiness(&self) -> Result<(), StoreError> {
        self.inner.readiness()
    }
}
