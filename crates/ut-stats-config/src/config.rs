// crates/ut-stats-config/src/config.rs
// ============================================================================
// Module: ut-stats Configuration
// Description: Configuration loading and validation for the ut-stats service.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: ut-stats-core, ut-stats-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. The ignore list is resolved
//! during validation so a malformed entry never reaches a running server.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use ut_stats_core::AggregateOptions;
use ut_stats_core::IgnoreListError;
use ut_stats_core::InstallId;
use ut_stats_core::StaticIgnoreList;
use ut_stats_store_sqlite::SqliteStoreConfig;
use ut_stats_store_sqlite::SqliteStoreMode;
use ut_stats_store_sqlite::SqliteSyncMode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "ut-stats.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "UT_STATS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum ignore list file size in bytes.
pub const MAX_IGNORE_LIST_FILE_SIZE: usize = 4 * 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum report body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Default maximum crash log body size in bytes.
const DEFAULT_MAX_LOG_BYTES: usize = 4 * 1024 * 1024;
/// Hard ceiling for any configured body limit.
const MAX_BODY_LIMIT: usize = 16 * 1024 * 1024;
/// Default `SQLite` busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default `SQLite` read pool size.
const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Maximum `SQLite` read pool size.
const MAX_READ_POOL_SIZE: usize = 64;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level ut-stats configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtStatsConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Telemetry store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Installations excluded from stats.
    #[serde(default)]
    pub ignore_list: IgnoreListConfig,
    /// Stats computation switches.
    #[serde(default)]
    pub stats: StatsConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Resolved ignore list (not serialized).
    #[serde(skip)]
    resolved_ignore_list: StaticIgnoreList,
}

impl UtStatsConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let content = read_bounded_utf8(&resolved, MAX_CONFIG_FILE_SIZE, "config file")?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(ignore_path) = config.ignore_list.path.clone() {
            let relative_base = resolved.parent().unwrap_or_else(|| Path::new(""));
            config.ignore_list.path = Some(resolve_relative(relative_base, &ignore_path));
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the TOML is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the configuration and resolves the ignore list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        self.resolved_ignore_list = self.ignore_list.resolve()?;
        Ok(())
    }

    /// Returns the ignore list resolved by [`Self::validate`].
    #[must_use]
    pub const fn ignore_list(&self) -> &StaticIgnoreList {
        &self.resolved_ignore_list
    }

    /// Returns the aggregation options.
    #[must_use]
    pub const fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            filter_ignored_everywhere: self.stats.filter_ignored_everywhere,
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum report body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum crash log body size in bytes.
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid server.bind: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_BODY_LIMIT {
            return Err(ConfigError::Invalid("server.max_body_bytes out of range".to_string()));
        }
        if self.max_log_bytes == 0 || self.max_log_bytes > MAX_BODY_LIMIT {
            return Err(ConfigError::Invalid("server.max_log_bytes out of range".to_string()));
        }
        Ok(())
    }
}

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default report body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Returns the default crash log body limit.
const fn default_max_log_bytes() -> usize {
    DEFAULT_MAX_LOG_BYTES
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Telemetry store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory store (lost on restart).
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite,
}

impl StoreType {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Telemetry store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of read connections.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }
}

impl StoreConfig {
    /// Builds the `SQLite` store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the backend is not sqlite or has
    /// no path.
    pub fn sqlite_config(&self) -> Result<SqliteStoreConfig, ConfigError> {
        if self.store_type != StoreType::Sqlite {
            return Err(ConfigError::Invalid("store.type is not sqlite".to_string()));
        }
        let path = self
            .path
            .clone()
            .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
        Ok(SqliteStoreConfig {
            path,
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            read_pool_size: self.read_pool_size,
        })
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path(path)?;
                if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
                    return Err(ConfigError::Invalid(
                        "store.read_pool_size out of range".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default read pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Ignore List
// ============================================================================

/// Ignore list sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnoreListConfig {
    /// Inline installation identifiers.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Optional file with one identifier per line.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl IgnoreListConfig {
    /// Resolves inline ids and the optional file into one list.
    fn resolve(&self) -> Result<StaticIgnoreList, ConfigError> {
        let mut ids = Vec::with_capacity(self.ids.len());
        for (index, raw) in self.ids.iter().enumerate() {
            let id = InstallId::parse(raw.trim()).map_err(|err| {
                ConfigError::Invalid(format!("ignore_list.ids[{index}]: {err}"))
            })?;
            ids.push(id);
        }
        let mut list = StaticIgnoreList::new(ids);
        if let Some(path) = &self.path {
            validate_path(path)?;
            let content = read_bounded_utf8(path, MAX_IGNORE_LIST_FILE_SIZE, "ignore list")?;
            let from_file = StaticIgnoreList::parse(&content).map_err(ConfigError::from)?;
            list.extend(from_file);
        }
        Ok(list)
    }
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Stats computation switches.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    /// Apply the ignore list to usage, check, and launch stats too.
    #[serde(default)]
    pub filter_ignored_everywhere: bool,
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard audit events.
    None,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (AuditSinkType::File, Some(path)) => validate_path(path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path requires audit.sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<IgnoreListError> for ConfigError {
    fn from(error: IgnoreListError) -> Self {
        Self::Invalid(format!("ignore_list.path: {error}"))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Joins a relative path onto the config file's directory.
fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { base.join(path) }
}

/// Validates a path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("path must be non-empty".to_string()));
    }
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("path component too long".to_string()));
        }
    }
    Ok(())
}

/// Reads a UTF-8 file, failing closed above `limit` bytes.
fn read_bounded_utf8(path: &Path, limit: usize, label: &str) -> Result<String, ConfigError> {
    let bytes = fs::read(path)
        .map_err(|err| ConfigError::Io(format!("{label} {}: {err}", path.display())))?;
    if bytes.len() > limit {
        return Err(ConfigError::Invalid(format!("{label} exceeds size limit")));
    }
    String::from_utf8(bytes).map_err(|_| ConfigError::Invalid(format!("{label} must be utf-8")))
}
