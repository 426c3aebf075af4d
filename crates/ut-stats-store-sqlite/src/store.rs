// crates/ut-stats-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Telemetry Store
// Description: Durable telemetry store backed by SQLite WAL.
// Purpose: Persist identities, counters, crashes, and checks with atomic upserts.
// Dependencies: ut-stats-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements every ut-stats store interface on one `SQLite`
//! database. Counter updates are single `INSERT ... ON CONFLICT DO UPDATE`
//! statements, so concurrent reports never lose an increment. Writes go
//! through one connection; reads rotate over a pool of connections so scans
//! never queue behind unrelated reads. Crash logs carry a digest that is
//! verified on load.
//! Security posture: database contents are untrusted and are re-validated on
//! load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use ut_stats_core::ActionName;
use ut_stats_core::CheckName;
use ut_stats_core::CheckRecord;
use ut_stats_core::CheckStore;
use ut_stats_core::CheckValue;
use ut_stats_core::CrashId;
use ut_stats_core::CrashLog;
use ut_stats_core::CrashMetadata;
use ut_stats_core::CrashRecord;
use ut_stats_core::CrashStore;
use ut_stats_core::HashAlgorithm;
use ut_stats_core::HashDigest;
use ut_stats_core::IdentityAttributes;
use ut_stats_core::IdentityRecord;
use ut_stats_core::IdentityStore;
use ut_stats_core::InstallId;
use ut_stats_core::LaunchCounts;
use ut_stats_core::LaunchMode;
use ut_stats_core::StoreError;
use ut_stats_core::TelemetryStore;
use ut_stats_core::Timestamp;
use ut_stats_core::UsageRecord;
use ut_stats_core::UsageStore;
use ut_stats_core::hash_bytes;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum crash log size accepted by the store.
pub const MAX_CRASH_LOG_BYTES: usize = 16 * 1024 * 1024;

/// Columns selected for identity rows, in [`identity_from_row`] order.
const IDENTITY_COLUMNS: &str = "id, version, build, utsversion, lang, trayena, isdeb, wifiena, \
                                pcmodel, pcyear, weirdpc, defaultos, osversion, launch_normal, \
                                launch_tray, lastrequest";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` telemetry store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `read_pool_size` must be greater than zero.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read-only connections used for read path isolation.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Builds a config with defaults for everything but the path.
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read connection pool size.
const fn default_read_pool_size() -> usize {
    4
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding raw crash logs or check values.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Payload exceeded the store size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "crash log exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps an engine error into a store error.
#[allow(clippy::needless_pass_by_value, reason = "Used as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed telemetry store.
///
/// # Invariants
/// - Every mutating call is one transaction on the write connection.
/// - Read connections never write.
/// - Stores from [`SqliteTelemetryStore::open_read_only`] hold no writable
///   connection.
#[derive(Clone)]
pub struct SqliteTelemetryStore {
    /// Write connection.
    write_connection: Arc<Mutex<Connection>>,
    /// Round-robin read connections.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Next read connection index.
    read_cursor: Arc<AtomicUsize>,
}

impl std::fmt::Debug for SqliteTelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTelemetryStore")
            .field("read_pool_size", &self.read_connections.len())
            .finish_non_exhaustive()
    }
}

impl SqliteTelemetryStore {
    /// Opens an `SQLite`-backed telemetry store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let mut write_connection = open_connection(config)?;
        initialize_schema(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            let mut read_connection = open_connection(config)?;
            initialize_schema(&mut read_connection)?;
            read_connections.push(Mutex::new(read_connection));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Opens an existing store without creating or migrating it.
    ///
    /// Every connection is opened read-only, so mutating calls fail with a
    /// database error and the file is never created or modified.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file is missing, cannot be
    /// opened, or carries an unknown schema version.
    pub fn open_read_only(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        if !config.path.is_file() {
            return Err(SqliteStoreError::Io(format!(
                "store file not found: {}",
                config.path.display()
            )));
        }
        if config.read_pool_size == 0 {
            return Err(SqliteStoreError::Invalid(
                "read_pool_size must be greater than zero".to_string(),
            ));
        }
        let write_connection = open_read_only_connection(config)?;
        verify_schema(&write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_read_only_connection(config)?));
        }
        Ok(Self {
            write_connection: Arc::new(Mutex::new(write_connection)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the next read connection using round-robin selection.
    fn read_connection(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        let len = self.read_connections.len();
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        self.read_connections[index]
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite read mutex poisoned".to_string()))
    }

    /// Locks the write connection.
    fn write_connection(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Io("sqlite write mutex poisoned".to_string()))
    }

    /// Verifies both connection paths can execute a simple statement.
    fn check_connection(&self) -> Result<(), SqliteStoreError> {
        self.read_connection()?.execute_batch("SELECT 1").map_err(db_error)?;
        self.write_connection()?.execute_batch("SELECT 1").map_err(db_error)
    }

    /// Applies an identity report in one transaction and returns the result.
    fn upsert_identity_row(
        &self,
        id: &InstallId,
        attributes: &IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) -> Result<IdentityRecord, SqliteStoreError> {
        let delta = LaunchCounts::delta_for(launch_mode);
        let lastrequest = format_timestamp(at)?;
        let mut connection = self.write_connection()?;
        let tx = connection.transaction().map_err(db_error)?;
        tx.execute(
            "INSERT INTO installations (id, version, build, utsversion, lang, trayena, isdeb, \
             wifiena, pcmodel, pcyear, weirdpc, defaultos, osversion, launch_normal, \
             launch_tray, lastrequest)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                build = excluded.build,
                utsversion = excluded.utsversion,
                lang = excluded.lang,
                trayena = excluded.trayena,
                isdeb = excluded.isdeb,
                wifiena = excluded.wifiena,
                pcmodel = excluded.pcmodel,
                pcyear = excluded.pcyear,
                weirdpc = excluded.weirdpc,
                defaultos = excluded.defaultos,
                osversion = excluded.osversion,
                launch_normal = installations.launch_normal + excluded.launch_normal,
                launch_tray = installations.launch_tray + excluded.launch_tray,
                lastrequest = excluded.lastrequest",
            params![
                id.as_str(),
                attributes.version,
                attributes.build,
                attributes.utsversion,
                attributes.lang,
                attributes.trayena,
                attributes.isdeb,
                attributes.wifiena,
                attributes.pcmodel,
                attributes.pcyear,
                attributes.weirdpc,
                attributes.defaultos,
                attributes.osversion,
                to_sql_count(delta.normal),
                to_sql_count(delta.tray),
                lastrequest,
            ],
        )
        .map_err(db_error)?;
        let raw = tx
            .query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM installations WHERE id = ?1"),
                params![id.as_str()],
                identity_from_row,
            )
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        raw.into_record()
    }

    /// Loads one identity row.
    fn load_identity_row(
        &self,
        id: &InstallId,
    ) -> Result<Option<IdentityRecord>, SqliteStoreError> {
        let raw = self
            .read_connection()?
            .query_row(
                &format!("SELECT {IDENTITY_COLUMNS} FROM installations WHERE id = ?1"),
                params![id.as_str()],
                identity_from_row,
            )
            .optional()
            .map_err(db_error)?;
        raw.map(RawIdentity::into_record).transpose()
    }

    /// Scans every identity row ordered by identifier.
    fn scan_identity_rows(&self) -> Result<Vec<IdentityRecord>, SqliteStoreError> {
        let connection = self.read_connection()?;
        let mut stmt = connection
            .prepare(&format!("SELECT {IDENTITY_COLUMNS} FROM installations ORDER BY id"))
            .map_err(db_error)?;
        let rows = stmt.query_map([], identity_from_row).map_err(db_error)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(db_error)?.into_record()?);
        }
        Ok(records)
    }

    /// Atomically bumps one usage counter.
    fn increment_usage_row(
        &self,
        id: &InstallId,
        action: &ActionName,
    ) -> Result<u64, SqliteStoreError> {
        let connection = self.write_connection()?;
        let count: i64 = connection
            .query_row(
                "INSERT INTO usage_counts (id, action, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(id, action) DO UPDATE SET count = usage_counts.count + 1
                 RETURNING count",
                params![id.as_str(), action.as_str()],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        from_sql_count(count)
    }

    /// Scans every usage row.
    fn scan_usage_rows(&self) -> Result<Vec<UsageRecord>, SqliteStoreError> {
        let connection = self.read_connection()?;
        let mut stmt = connection
            .prepare("SELECT id, action, count FROM usage_counts ORDER BY id, action")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(db_error)?;
        let mut records = Vec::new();
        for row in rows {
            let (id, action, count) = row.map_err(db_error)?;
            records.push(UsageRecord {
                id: parse_install_id(&id)?,
                action: ActionName::parse(&action)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                count: from_sql_count(count)?,
            });
        }
        Ok(records)
    }

    /// Sums usage counts per action in the database.
    fn sum_usage_rows(&self) -> Result<BTreeMap<ActionName, u64>, SqliteStoreError> {
        let connection = self.read_connection()?;
        let mut stmt = connection
            .prepare(
                "SELECT action, SUM(count) FROM usage_counts GROUP BY action ORDER BY action",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_error)?;
        let mut sums = BTreeMap::new();
        for row in rows {
            let (action, total) = row.map_err(db_error)?;
            let action = ActionName::parse(&action)
                .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?;
            sums.insert(action, from_sql_count(total)?);
        }
        Ok(sums)
    }

    /// Writes crash metadata.
    fn put_crash_row(&self, record: &CrashRecord) -> Result<(), SqliteStoreError> {
        let reported_at = format_timestamp(record.reported_at)?;
        let metadata = &record.metadata;
        self.write_connection()?
            .execute(
                "INSERT INTO crashes (id, crash_id, version, build, utsversion, isdeb, message, \
                 reported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id, crash_id) DO UPDATE SET
                    version = excluded.version,
                    build = excluded.build,
                    utsversion = excluded.utsversion,
                    isdeb = excluded.isdeb,
                    message = excluded.message,
                    reported_at = excluded.reported_at",
                params![
                    record.id.as_str(),
                    record.crash_id.as_str(),
                    metadata.version,
                    metadata.build,
                    metadata.utsversion,
                    metadata.isdeb,
                    metadata.message,
                    reported_at,
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Loads crash metadata.
    fn load_crash_row(
        &self,
        id: &InstallId,
        crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, SqliteStoreError> {
        let row = self
            .read_connection()?
            .query_row(
                "SELECT version, build, utsversion, isdeb, message, reported_at FROM crashes \
                 WHERE id = ?1 AND crash_id = ?2",
                params![id.as_str(), crash_id.as_str()],
                |row| {
                    Ok((
                        CrashMetadata {
                            version: row.get(0)?,
                            build: row.get(1)?,
                            utsversion: row.get(2)?,
                            isdeb: row.get(3)?,
                            message: row.get(4)?,
                        },
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;
        let Some((metadata, reported_at)) = row else {
            return Ok(None);
        };
        Ok(Some(CrashRecord {
            id: id.clone(),
            crash_id: crash_id.clone(),
            metadata,
            reported_at: parse_timestamp(&reported_at)?,
        }))
    }

    /// Writes a crash log with its digest.
    fn put_crash_log_row(&self, log: &CrashLog) -> Result<(), SqliteStoreError> {
        if log.text.len() > MAX_CRASH_LOG_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_CRASH_LOG_BYTES,
                actual_bytes: log.text.len(),
            });
        }
        let attached_at = format_timestamp(log.attached_at)?;
        self.write_connection()?
            .execute(
                "INSERT INTO crash_logs (crash_id, log_text, log_hash, hash_algorithm, \
                 attached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(crash_id) DO UPDATE SET
                    log_text = excluded.log_text,
                    log_hash = excluded.log_hash,
                    hash_algorithm = excluded.hash_algorithm,
                    attached_at = excluded.attached_at",
                params![
                    log.crash_id.as_str(),
                    log.text,
                    log.digest.value,
                    log.digest.algorithm.label(),
                    attached_at,
                ],
            )
            .map_err(db_error)?;
        Ok(())
    }

    /// Loads a crash log and verifies its digest.
    fn load_crash_log_row(&self, crash_id: &CrashId) -> Result<Option<CrashLog>, SqliteStoreError> {
        let row = self
            .read_connection()?
            .query_row(
                "SELECT log_text, log_hash, hash_algorithm, attached_at FROM crash_logs WHERE \
                 crash_id = ?1",
                params![crash_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;
        let Some((text, hash_value, hash_algorithm, attached_at)) = row else {
            return Ok(None);
        };
        let algorithm = HashAlgorithm::from_label(&hash_algorithm).ok_or_else(|| {
            SqliteStoreError::Invalid(format!("unsupported hash algorithm: {hash_algorithm}"))
        })?;
        let expected = hash_bytes(algorithm, text.as_bytes());
        if expected.value != hash_value {
            return Err(SqliteStoreError::Corrupt(format!(
                "crash log hash mismatch for {crash_id}"
            )));
        }
        Ok(Some(CrashLog {
            crash_id: crash_id.clone(),
            text,
            digest: HashDigest {
                algorithm,
                value: hash_value,
            },
            attached_at: parse_timestamp(&attached_at)?,
        }))
    }

    /// Writes every check value in one transaction.
    fn put_check_rows(
        &self,
        id: &InstallId,
        checks: &BTreeMap<CheckName, CheckValue>,
        at: Timestamp,
    ) -> Result<(), SqliteStoreError> {
        let updated_at = format_timestamp(at)?;
        let mut connection = self.write_connection()?;
        let tx = connection.transaction().map_err(db_error)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO checks (id, name, value_json, updated_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(id, name) DO UPDATE SET
                        value_json = excluded.value_json,
                        updated_at = excluded.updated_at",
                )
                .map_err(db_error)?;
            for (name, value) in checks {
                let value_json = serde_json::to_string(value)
                    .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
                stmt.execute(params![id.as_str(), name.as_str(), value_json, updated_at])
                    .map_err(db_error)?;
            }
        }
        tx.commit().map_err(db_error)
    }

    /// Scans every check row.
    fn scan_check_rows(&self) -> Result<Vec<CheckRecord>, SqliteStoreError> {
        let connection = self.read_connection()?;
        let mut stmt = connection
            .prepare("SELECT id, name, value_json, updated_at FROM checks ORDER BY id, name")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_error)?;
        let mut records = Vec::new();
        for row in rows {
            let (id, name, value_json, updated_at) = row.map_err(db_error)?;
            records.push(CheckRecord {
                id: parse_install_id(&id)?,
                name: CheckName::parse(&name)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                value: serde_json::from_str(&value_json)
                    .map_err(|err| SqliteStoreError::Corrupt(err.to_string()))?,
                updated_at: parse_timestamp(&updated_at)?,
            });
        }
        Ok(records)
    }
}

// ============================================================================
// SECTION: Trait Implementations
// ============================================================================

impl IdentityStore for SqliteTelemetryStore {
    fn upsert_identity(
        &self,
        id: &InstallId,
        attributes: IdentityAttributes,
        launch_mode: Option<LaunchMode>,
        at: Timestamp,
    ) -> Result<IdentityRecord, StoreError> {
        self.upsert_identity_row(id, &attributes, launch_mode, at).map_err(StoreError::from)
    }

    fn load_identity(&self, id: &InstallId) -> Result<Option<IdentityRecord>, StoreError> {
        self.load_identity_row(id).map_err(StoreError::from)
    }

    fn scan_identities(&self) -> Result<Vec<IdentityRecord>, StoreError> {
        self.scan_identity_rows().map_err(StoreError::from)
    }
}

impl UsageStore for SqliteTelemetryStore {
    fn increment_usage(&self, id: &InstallId, action: &ActionName) -> Result<u64, StoreError> {
        self.increment_usage_row(id, action).map_err(StoreError::from)
    }

    fn scan_usage(&self) -> Result<Vec<UsageRecord>, StoreError> {
        self.scan_usage_rows().map_err(StoreError::from)
    }

    fn sum_usage_by_action(&self) -> Result<BTreeMap<ActionName, u64>, StoreError> {
        self.sum_usage_rows().map_err(StoreError::from)
    }
}

impl CrashStore for SqliteTelemetryStore {
    fn put_crash(&self, record: &CrashRecord) -> Result<(), StoreError> {
        self.put_crash_row(record).map_err(StoreError::from)
    }

    fn load_crash(
        &self,
        id: &InstallId,
        crash_id: &CrashId,
    ) -> Result<Option<CrashRecord>, StoreError> {
        self.load_crash_row(id, crash_id).map_err(StoreError::from)
    }

    fn put_crash_log(&self, log: &CrashLog) -> Result<(), StoreError> {
        self.put_crash_log_row(log).map_err(StoreError::from)
    }

    fn load_crash_log(&self, crash_id: &CrashId) -> Result<Option<CrashLog>, StoreError> {
        self.load_crash_log_row(crash_id).map_err(StoreError::from)
    }
}

impl CheckStore for SqliteTelemetryStore {
    fn put_checks(
        &self,
        id: &InstallId,
        checks: &BTreeMap<CheckName, CheckValue>,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.put_check_rows(id, checks, at).map_err(StoreError::from)
    }

    fn scan_checks(&self) -> Result<Vec<CheckRecord>, StoreError> {
        self.scan_check_rows().map_err(StoreError::from)
    }
}

impl TelemetryStore for SqliteTelemetryStore {
    fn readiness(&self) -> Result<(), StoreError> {
        self.check_connection().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Identity row as stored, before domain validation.
#[derive(Debug)]
struct RawIdentity {
    /// Stored identifier.
    id: String,
    /// Stored scalar attributes.
    attributes: IdentityAttributes,
    /// Stored normal-launch counter.
    launch_normal: i64,
    /// Stored tray-launch counter.
    launch_tray: i64,
    /// Stored last-request timestamp.
    lastrequest: Option<String>,
}

impl RawIdentity {
    /// Validates the row into a domain record.
    fn into_record(self) -> Result<IdentityRecord, SqliteStoreError> {
        Ok(IdentityRecord {
            id: parse_install_id(&self.id)?,
            attributes: self.attributes,
            launch: LaunchCounts {
                normal: from_sql_count(self.launch_normal)?,
                tray: from_sql_count(self.launch_tray)?,
            },
            lastrequest: self.lastrequest.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Reads an identity row selected with [`IDENTITY_COLUMNS`].
fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<RawIdentity> {
    Ok(RawIdentity {
        id: row.get(0)?,
        attributes: IdentityAttributes {
            version: row.get(1)?,
            build: row.get(2)?,
            utsversion: row.get(3)?,
            lang: row.get(4)?,
            trayena: row.get(5)?,
            isdeb: row.get(6)?,
            wifiena: row.get(7)?,
            pcmodel: row.get(8)?,
            pcyear: row.get(9)?,
            weirdpc: row.get(10)?,
            defaultos: row.get(11)?,
            osversion: row.get(12)?,
        },
        launch_normal: row.get(13)?,
        launch_tray: row.get(14)?,
        lastrequest: row.get(15)?,
    })
}

/// Parses a stored installation identifier.
fn parse_install_id(value: &str) -> Result<InstallId, SqliteStoreError> {
    InstallId::parse(value).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Renders a timestamp for storage.
fn format_timestamp(value: Timestamp) -> Result<String, SqliteStoreError> {
    value.to_rfc3339().map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a stored timestamp.
fn parse_timestamp(value: &str) -> Result<Timestamp, SqliteStoreError> {
    Timestamp::parse_rfc3339(value).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
}

/// Converts a counter into its `SQLite` integer form.
fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Converts a stored integer back into a counter.
fn from_sql_count(value: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative counter value: {value}")))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path.display().to_string().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqliteStoreError::Invalid(
            "store path contains an overlong component".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Opens a read-only `SQLite` connection to an existing file.
fn open_read_only_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    Ok(())
}

/// Checks that an existing store carries the supported schema version.
fn verify_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    let version: Option<i64> = connection
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        Some(value) if value == SCHEMA_VERSION => Ok(()),
        Some(value) => Err(SqliteStoreError::VersionMismatch(format!(
            "unsupported schema version: {value}"
        ))),
        None => Err(SqliteStoreError::Invalid("store schema is not initialized".to_string())),
    }
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
        .map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS installations (
                    id TEXT PRIMARY KEY NOT NULL,
                    version TEXT,
                    build TEXT,
                    utsversion TEXT,
                    lang TEXT,
                    trayena INTEGER,
                    isdeb INTEGER,
                    wifiena INTEGER,
                    pcmodel TEXT,
                    pcyear TEXT,
                    weirdpc INTEGER,
                    defaultos INTEGER,
                    osversion TEXT,
                    launch_normal INTEGER NOT NULL DEFAULT 0,
                    launch_tray INTEGER NOT NULL DEFAULT 0,
                    lastrequest TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_installations_lastrequest
                    ON installations (lastrequest);
                CREATE TABLE IF NOT EXISTS usage_counts (
                    id TEXT NOT NULL,
                    action TEXT NOT NULL,
                    count INTEGER NOT NULL,
                    PRIMARY KEY (id, action)
                );
                CREATE INDEX IF NOT EXISTS idx_usage_counts_action ON usage_counts (action);
                CREATE TABLE IF NOT EXISTS crashes (
                    id TEXT NOT NULL,
                    crash_id TEXT NOT NULL,
                    version TEXT,
                    build TEXT,
                    utsversion TEXT,
                    isdeb INTEGER,
                    message TEXT,
                    reported_at TEXT NOT NULL,
                    PRIMARY KEY (id, crash_id)
                );
                CREATE TABLE IF NOT EXISTS crash_logs (
                    crash_id TEXT PRIMARY KEY NOT NULL,
                    log_text TEXT NOT NULL,
                    log_hash TEXT NOT NULL,
                    hash_algorithm TEXT NOT NULL,
                    attached_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS checks (
                    id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    value_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (id, name)
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}
