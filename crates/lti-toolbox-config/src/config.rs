// crates/lti-toolbox-config/src/config.rs
// ============================================================================
// Module: LTI Toolbox Configuration
// Description: Configuration description loading and validation.
// Purpose: Provide strict, fail-closed parsing of tool descriptions.
// Dependencies: lti-toolbox-core, lti-toolbox-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! The configuration description is a TOML document:
//!
//! ```toml
//! [tool]
//! name = "Grade Sync"
//! launch-privacy = "name_only"
//! log = "logs/tool.log"
//!
//! [tool.handlers]
//! launch = "app/launch.php?mode=student"
//! dashboard = "app/dashboard.php"
//!
//! [tool.placements.course_navigation]
//! text = "Grade Sync"
//!
//! [storage]
//! path = "toolbox.db"
//!
//! [canvas]
//! url = "https://canvas.example.edu"
//! token = "..."
//! ```
//!
//! Handler and placement tables keep document order so "the first handler"
//! is well defined. Unknown keys are rejected everywhere.
//! Security posture: config inputs are untrusted and size-limited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use lti_toolbox_core::CanvasCredentials;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::PlacementConfig;
use lti_toolbox_store_sqlite::SqliteStoreConfig;
use lti_toolbox_store_sqlite::SqliteStoreMode;
use lti_toolbox_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use serde::Deserializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum `SQLite` busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default storage database path, relative to the configuration directory.
pub const DEFAULT_STORAGE_PATH: &str = "lti-toolbox.db";
/// Default log path, relative to the configuration directory.
pub const DEFAULT_LOG_PATH: &str = "lti.log";
/// Default TTL for cached LMS lookups.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config Root
// ============================================================================

/// Parsed configuration description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolboxConfig {
    /// Tool identity, handlers, and placements.
    #[serde(default)]
    pub tool: ToolConfig,
    /// Storage engine connection parameters.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Canvas API credentials.
    #[serde(default)]
    pub canvas: Option<CanvasConfig>,
    /// Public web location of the configuration directory.
    #[serde(default)]
    pub web: WebConfig,
    /// LMS lookup cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl ToolboxConfig {
    /// Loads and validates a configuration description from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, is too large,
    /// is not UTF-8, fails to parse, or fails validation.
    pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
        validate_path(path)?;
        let resolved = fs::canonicalize(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let contents = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config = Self::parse(&contents)?;
        let directory = resolved.parent().map(Path::to_path_buf).ok_or_else(|| {
            ConfigError::Invalid("config file has no parent directory".to_string())
        })?;
        Ok(LoadedConfig {
            config,
            path: resolved,
            directory,
            contents,
        })
    }

    /// Parses and validates a configuration description from text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        if contents.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tool.validate()?;
        self.storage.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tool
// ============================================================================

/// `[tool]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolConfig {
    /// Explicit tool id; derived from the description when absent or blank.
    #[serde(default)]
    pub id: Option<String>,
    /// Human-readable name; defaults to the tool id.
    #[serde(default)]
    pub name: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Icon file (relative to the config directory) or URL.
    #[serde(default)]
    pub icon: Option<String>,
    /// Optional tool domain.
    #[serde(default)]
    pub domain: Option<String>,
    /// Launch privacy token (`public`, `name_only`, `anonymous`).
    #[serde(default)]
    pub launch_privacy: Option<String>,
    /// Launch (authenticate) URL, relative to the config directory.
    #[serde(default)]
    pub authenticate: Option<String>,
    /// Log file path, relative to the config directory.
    #[serde(default)]
    pub log: Option<String>,
    /// Handler entries in document order.
    #[serde(default, deserialize_with = "ordered_string_pairs")]
    pub handlers: Vec<(String, String)>,
    /// Placement blocks in document order.
    #[serde(default, deserialize_with = "ordered_placements")]
    pub placements: Vec<PlacementConfig>,
}

impl ToolConfig {
    /// Returns the explicit id when present and non-blank.
    #[must_use]
    pub fn explicit_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Validates path-like fields.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(log) = &self.log {
            validate_path_string("tool.log", log)?;
        }
        if let Some(id) = self.explicit_id()
            && id.chars().any(|c| c.is_whitespace() || c == '/')
        {
            return Err(ConfigError::Invalid(
                "tool.id must not contain whitespace or '/'".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// `[storage]` table: storage engine connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct StorageConfig {
    /// Database path, relative to the config directory.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StorageConfig {
    /// Builds the store config with the path resolved against `directory`.
    #[must_use]
    pub fn store_config(&self, directory: &Path) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: resolve_relative(directory, &self.path),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Validates storage parameters.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.path", &self.path)?;
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "storage.busy-timeout-ms must be between 1 and {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Returns the default storage path.
fn default_storage_path() -> String {
    DEFAULT_STORAGE_PATH.to_string()
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Canvas, Web, Cache
// ============================================================================

/// `[canvas]` table.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CanvasConfig {
    /// Canvas instance URL.
    #[serde(default)]
    pub url: Option<String>,
    /// API bearer token.
    #[serde(default)]
    pub token: Option<String>,
}

impl CanvasConfig {
    /// Returns the credentials carried by the table.
    #[must_use]
    pub fn credentials(&self) -> CanvasCredentials {
        CanvasCredentials::new(
            self.url.clone().unwrap_or_default(),
            self.token.clone().unwrap_or_default(),
        )
    }
}

impl fmt::Debug for CanvasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `[web]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct WebConfig {
    /// Public URL under which the configuration directory is served.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// `[cache]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CacheConfig {
    /// Time-to-live for cached LMS lookups, in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    /// Returns the cache TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Validates cache settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("cache.ttl-seconds must be positive".to_string()));
        }
        Ok(())
    }
}

/// Returns the default cache TTL.
const fn default_cache_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

// ============================================================================
// SECTION: Loaded Config
// ============================================================================

/// A configuration description together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    /// Parsed description.
    pub config: ToolboxConfig,
    /// Canonical path of the description file.
    pub path: PathBuf,
    /// Directory containing the description.
    pub directory: PathBuf,
    /// Raw file contents, used for id derivation.
    pub contents: String,
}

impl LoadedConfig {
    /// Returns the base name of the configuration directory.
    #[must_use]
    pub fn directory_name(&self) -> String {
        self.directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Resolves a path from the description against the config directory.
    #[must_use]
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        resolve_relative(&self.directory, value)
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

impl From<ConfigError> for ConfigurationError {
    fn from(error: ConfigError) -> Self {
        Self::ParseFailure(error.to_string())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Joins relative paths onto `directory`; absolute paths pass through.
fn resolve_relative(directory: &Path, value: &str) -> PathBuf {
    let path = Path::new(value.trim());
    if path.is_absolute() { path.to_path_buf() } else { directory.join(path) }
}

/// Validates the config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Visitor collecting a string table in document order.
struct OrderedPairsVisitor;

impl<'de> Visitor<'de> for OrderedPairsVisitor {
    type Value = Vec<(String, String)>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a table of string values")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, String>()? {
            entries.push((key, value));
        }
        Ok(entries)
    }
}

/// Deserializes `[tool.handlers]` preserving entry order.
fn ordered_string_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(OrderedPairsVisitor)
}

/// Visitor collecting placement tables in document order.
struct OrderedPlacementsVisitor;

impl<'de> Visitor<'de> for OrderedPlacementsVisitor {
    type Value = Vec<PlacementConfig>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a table of placement tables")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut placements = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((option, properties)) =
            map.next_entry::<String, BTreeMap<String, String>>()?
        {
            placements.push(PlacementConfig {
                option,
                properties,
            });
        }
        Ok(placements)
    }
}

/// Deserializes `[tool.placements]` preserving table order.
fn ordered_placements<'de, D>(deserializer: D) -> Result<Vec<PlacementConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(OrderedPlacementsVisitor)
}
