// crates/lti-toolbox-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Toolbox Store
// Description: Durable StorageEngine and ConsumerConnector backed by SQLite WAL.
// Purpose: Persist namespaced JSON values with expiry and Tool Consumer records.
// Dependencies: lti-toolbox-core, rusqlite, serde, serde_json, base64, thiserror
// ============================================================================

//! ## Overview
//! Values are written as JSON text into a `(namespace, key)` keyed table with
//! an optional `expires_at_ms` column. Reads ignore expired rows; expired rows
//! are only deleted by [`StorageEngine::purge_expired`]. Writes are single
//! upserts, so concurrent writers to the same key resolve last-write-wins.
//!
//! Raw queries return rows as JSON objects. BLOB columns are rendered as
//! base64 strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lti_toolbox_core::ConsumerConnector;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::QueryRow;
use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_core::time::expiry_after;
use lti_toolbox_core::time::now_unix_millis;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

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
/// Maximum number of rows a raw query may return.
pub const MAX_QUERY_ROWS: usize = 10_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
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
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
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

/// Configuration for the `SQLite` toolbox store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
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
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StorageError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Unavailable(message),
            SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::VersionMismatch(message) => {
                Self::Backend(format!("schema version mismatch: {message}"))
            }
            SqliteStoreError::Invalid(message) => Self::Codec(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed storage engine and consumer connector.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens (creating if needed) an `SQLite` toolbox store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Runs `f` against the locked connection.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))?;
        f(&mut guard)
    }

    /// Loads a live value.
    fn load_value(&self, namespace: &str, key: &str) -> Result<Option<Value>, SqliteStoreError> {
        let now_ms = now_unix_millis();
        let row: Option<String> = self.with_connection(|connection| {
            connection
                .query_row(
                    "SELECT value_json FROM tool_metadata WHERE namespace = ?1 AND key = ?2 AND \
                     (expires_at_ms IS NULL OR expires_at_ms > ?3)",
                    params![namespace, key, now_ms],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })?;
        row.map(|text| {
            serde_json::from_str(&text).map_err(|err| {
                SqliteStoreError::Invalid(format!("value for {namespace}/{key}: {err}"))
            })
        })
        .transpose()
    }

    /// Upserts a value.
    fn store_value(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), SqliteStoreError> {
        let text =
            serde_json::to_string(value).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let now_ms = now_unix_millis();
        let expires_at_ms = ttl.map(|ttl| expiry_after(now_ms, ttl));
        self.with_connection(|connection| {
            connection
                .execute(
                    "INSERT INTO tool_metadata (namespace, key, value_json, expires_at_ms, \
                     updated_at_ms) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(namespace, key) DO \
                     UPDATE SET value_json = excluded.value_json, expires_at_ms = \
                     excluded.expires_at_ms, updated_at_ms = excluded.updated_at_ms",
                    params![namespace, key, text, expires_at_ms, now_ms],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    /// Deletes a value, reporting whether a live row existed.
    fn remove_value(&self, namespace: &str, key: &str) -> Result<bool, SqliteStoreError> {
        let now_ms = now_unix_millis();
        self.with_connection(|connection| {
            let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let live = tx
                .execute(
                    "DELETE FROM tool_metadata WHERE namespace = ?1 AND key = ?2 AND \
                     (expires_at_ms IS NULL OR expires_at_ms > ?3)",
                    params![namespace, key, now_ms],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute(
                "DELETE FROM tool_metadata WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(live > 0)
        })
    }

    /// Deletes expired rows.
    fn purge(&self) -> Result<usize, SqliteStoreError> {
        let now_ms = now_unix_millis();
        self.with_connection(|connection| {
            connection
                .execute(
                    "DELETE FROM tool_metadata WHERE expires_at_ms IS NOT NULL AND expires_at_ms \
                     <= ?1",
                    params![now_ms],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    /// Executes a raw statement and collects its rows.
    fn run_query(&self, sql: &str) -> Result<Vec<QueryRow>, SqliteStoreError> {
        self.with_connection(|connection| {
            let mut statement =
                connection.prepare(sql).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let columns: Vec<String> =
                statement.column_names().into_iter().map(str::to_string).collect();
            let mut rows =
                statement.query([]).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let mut out = Vec::new();
            while let Some(row) =
                rows.next().map_err(|err| SqliteStoreError::Db(err.to_string()))?
            {
                if out.len() >= MAX_QUERY_ROWS {
                    return Err(SqliteStoreError::Invalid(format!(
                        "query returned more than {MAX_QUERY_ROWS} rows"
                    )));
                }
                let mut object = QueryRow::new();
                for (index, column) in columns.iter().enumerate() {
                    let value =
                        row.get_ref(index).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
                    object.insert(column.clone(), column_value(value));
                }
                out.push(object);
            }
            Ok(out)
        })
    }

    /// Lists consumers in creation order.
    fn consumers(&self) -> Result<Vec<ToolConsumer>, SqliteStoreError> {
        self.with_connection(|connection| {
            let mut statement = connection
                .prepare(
                    "SELECT consumer_key, name, secret, enabled, created_at_ms FROM lti_consumer \
                     ORDER BY created_at_ms, rowid",
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            let rows = statement
                .query_map([], consumer_from_row)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    /// Upserts a consumer.
    fn upsert_consumer(&self, consumer: &ToolConsumer) -> Result<(), SqliteStoreError> {
        self.with_connection(|connection| {
            connection
                .execute(
                    "INSERT INTO lti_consumer (consumer_key, name, secret, enabled, \
                     created_at_ms) VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(consumer_key) DO \
                     UPDATE SET name = excluded.name, secret = excluded.secret, enabled = \
                     excluded.enabled",
                    params![
                        consumer.key.as_str(),
                        consumer.name,
                        consumer.secret,
                        i64::from(consumer.enabled),
                        consumer.created_at_ms
                    ],
                )
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            Ok(())
        })
    }

    /// Loads one consumer.
    fn consumer(&self, key: &ConsumerKey) -> Result<Option<ToolConsumer>, SqliteStoreError> {
        self.with_connection(|connection| {
            connection
                .query_row(
                    "SELECT consumer_key, name, secret, enabled, created_at_ms FROM lti_consumer \
                     WHERE consumer_key = ?1",
                    params![key.as_str()],
                    consumer_from_row,
                )
                .optional()
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }
}

impl StorageEngine for SqliteStorage {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.load_value(namespace, key).map_err(StorageError::from)
    }

    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        self.store_value(namespace, key, value, ttl).map_err(StorageError::from)
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        self.remove_value(namespace, key).map_err(StorageError::from)
    }

    fn purge_expired(&self) -> Result<usize, StorageError> {
        self.purge().map_err(StorageError::from)
    }

    fn query(&self, sql: &str) -> Result<Vec<QueryRow>, StorageError> {
        self.run_query(sql).map_err(StorageError::from)
    }
}

impl ConsumerConnector for SqliteStorage {
    fn list_consumers(&self) -> Result<Vec<ToolConsumer>, StorageError> {
        self.consumers().map_err(StorageError::from)
    }

    fn save_consumer(&self, consumer: &ToolConsumer) -> Result<(), StorageError> {
        self.upsert_consumer(consumer).map_err(StorageError::from)
    }

    fn load_consumer(&self, key: &ConsumerKey) -> Result<Option<ToolConsumer>, StorageError> {
        self.consumer(key).map_err(StorageError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps an `lti_consumer` row to a consumer record.
fn consumer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolConsumer> {
    let key: String = row.get(0)?;
    let enabled: i64 = row.get(3)?;
    Ok(ToolConsumer {
        key: ConsumerKey::new(key),
        name: row.get(1)?,
        secret: row.get(2)?,
        enabled: enabled != 0,
        created_at_ms: row.get(4)?,
    })
}

/// Converts an `SQLite` column value to JSON.
fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) => Value::Number(number.into()),
        ValueRef::Real(number) => Number::from_f64(number).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(STANDARD.encode(bytes)),
    }
}

/// Ensures the parent directory for the store path exists.
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
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS tool_metadata (
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value_json TEXT NOT NULL,
            expires_at_ms INTEGER,
            updated_at_ms INTEGER NOT NULL,
            PRIMARY KEY (namespace, key)
        );
        CREATE INDEX IF NOT EXISTS idx_tool_metadata_expires
            ON tool_metadata (expires_at_ms);
        CREATE TABLE IF NOT EXISTS lti_consumer (
            consumer_key TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            secret TEXT NOT NULL,
            enabled INTEGER NOT NULL,
            created_at_ms INTEGER NOT NULL
        );",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
