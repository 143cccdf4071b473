// crates/lti-toolbox/src/toolbox.rs
// ============================================================================
// Module: Toolbox
// Description: Request-scoped context tying configuration, storage, and LTI together.
// Purpose: Expose the Tool Provider operations behind one explicit object.
// Dependencies: serde, serde_json, lti-toolbox-config, lti-toolbox-core,
//               lti-toolbox-store-sqlite
// ============================================================================

//! ## Overview
//! A [`Toolbox`] is built once per request from a configuration path and
//! passed down the call chain. Opening it:
//!
//! 1. parses the configuration description,
//! 2. connects the storage engine (SQLite by default),
//! 3. purges expired cache entries,
//! 4. runs the configuration loader for the resolved tool id.
//!
//! Across requests only the storage engine persists: metadata is re-read
//! from the store, and LMS lookups go through the TTL [`ToolCache`]. A
//! toolbox is rebuilt from a [`PersistedReference`] rather than serialized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use lti_toolbox_config::LoadedConfig;
use lti_toolbox_config::ToolboxConfig;
use lti_toolbox_core::ApiError;
use lti_toolbox_core::CanvasCredentials;
use lti_toolbox_core::CanvasUser;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::ConsumerConnector;
use lti_toolbox_core::HandlerUrlMap;
use lti_toolbox_core::LaunchRequest;
use lti_toolbox_core::LaunchValidator;
use lti_toolbox_core::LmsApi;
use lti_toolbox_core::MetadataKey;
use lti_toolbox_core::QueryRow;
use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_core::ToolId;
use lti_toolbox_core::ToolMetadata;
use lti_toolbox_store_sqlite::SqliteStorage;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::cache::ToolCache;
use crate::canvas::CanvasClient;
use crate::canvas::CanvasClientConfig;
use crate::dispatcher::LaunchDispatcher;
use crate::error::ToolboxError;
use crate::generator::Generator;
use crate::loader::LoadOptions;
use crate::loader::LoadReport;
use crate::loader::load_configuration;
use crate::log::ToolLog;
use crate::metadata::MetadataStore;
use crate::registry::ConsumerRegistry;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Storage collaborators a toolbox runs against.
#[derive(Clone)]
pub struct ToolboxBackend {
    /// Key/value engine for metadata and cache.
    pub storage: Arc<dyn StorageEngine>,
    /// Consumer persistence.
    pub consumers: Arc<dyn ConsumerConnector>,
}

impl ToolboxBackend {
    /// Uses one SQLite store for both collaborators.
    #[must_use]
    pub fn sqlite(store: SqliteStorage) -> Self {
        let store = Arc::new(store);
        Self {
            storage: Arc::clone(&store) as Arc<dyn StorageEngine>,
            consumers: store,
        }
    }
}

/// Serializable handle from which a toolbox can be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedReference {
    /// Absolute path of the configuration description.
    pub config: PathBuf,
}

/// Builder for [`Toolbox`].
pub struct ToolboxBuilder {
    /// Configuration description path.
    path: PathBuf,
    /// Loader options.
    options: LoadOptions,
    /// Storage override; SQLite from `[storage]` when absent.
    backend: Option<ToolboxBackend>,
    /// LMS API override; Canvas from cached credentials when absent.
    api: Option<Arc<dyn LmsApi>>,
    /// Canvas client limits.
    api_config: CanvasClientConfig,
}

/// Tool Provider context for one request.
pub struct Toolbox {
    /// Parsed configuration description.
    loaded: LoadedConfig,
    /// Storage engine.
    storage: Arc<dyn StorageEngine>,
    /// Consumer persistence.
    consumers: Arc<dyn ConsumerConnector>,
    /// Tool metadata.
    metadata: MetadataStore,
    /// Tool log.
    log: ToolLog,
    /// TTL cache for LMS lookups.
    cache: ToolCache,
    /// Handler URLs from the metadata store.
    handlers: HandlerUrlMap,
    /// Outcome of the loader run.
    report: LoadReport,
    /// Lazily built LMS API client.
    api: Mutex<Option<Arc<dyn LmsApi>>>,
    /// Canvas client limits.
    api_config: CanvasClientConfig,
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("config", &self.loaded.path)
            .field("tool_id", &self.report.tool_id)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

impl ToolboxBuilder {
    /// Starts a builder for the description at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: LoadOptions::default(),
            backend: None,
            api: None,
            api_config: CanvasClientConfig::default(),
        }
    }

    /// Refreshes every metadata group regardless of the cache.
    #[must_use]
    pub fn force_recache(mut self, force: bool) -> Self {
        self.options.force_recache = force;
        self
    }

    /// Sets the entry-point URL used when no `authenticate` path is configured.
    #[must_use]
    pub fn script_url(mut self, url: impl Into<String>) -> Self {
        self.options.script_url = Some(url.into());
        self
    }

    /// Runs against `backend` instead of the configured SQLite store.
    #[must_use]
    pub fn backend(mut self, backend: ToolboxBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Uses `api` for LMS calls instead of a Canvas client.
    #[must_use]
    pub fn lms_api(mut self, api: Arc<dyn LmsApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Overrides Canvas client limits.
    #[must_use]
    pub fn api_config(mut self, config: CanvasClientConfig) -> Self {
        self.api_config = config;
        self
    }

    /// Opens the toolbox.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ParseFailure`] for an unreadable
    /// description, [`ConfigurationError::StorageUnavailable`] when the store
    /// cannot be opened, and the loader's errors otherwise.
    pub fn open(self) -> Result<Toolbox, ToolboxError> {
        let loaded = ToolboxConfig::load(&self.path).map_err(ConfigurationError::from)?;
        let backend = match self.backend {
            Some(backend) => backend,
            None => open_sqlite(&loaded)?,
        };
        backend.storage.purge_expired()?;

        let log = ToolLog::new();
        let (tool_id, _) = crate::loader::resolve_tool_id(&loaded);
        log.bind_tool(&tool_id);
        let metadata = MetadataStore::new(Arc::clone(&backend.storage), tool_id.clone());
        let report = load_configuration(&loaded, &metadata, &log, &self.options)?;
        let handlers = metadata
            .get_typed::<HandlerUrlMap>(MetadataKey::HandlerUrls)?
            .ok_or(ConfigurationError::MissingHandlers)?;
        let cache =
            ToolCache::new(Arc::clone(&backend.storage), &tool_id, loaded.config.cache.ttl());

        Ok(Toolbox {
            loaded,
            storage: backend.storage,
            consumers: backend.consumers,
            metadata,
            log,
            cache,
            handlers,
            report,
            api: Mutex::new(self.api),
            api_config: self.api_config,
        })
    }
}

// ============================================================================
// SECTION: Toolbox
// ============================================================================

impl Toolbox {
    /// Opens a toolbox for `path` with the default SQLite backend.
    ///
    /// # Errors
    ///
    /// See [`ToolboxBuilder::open`].
    pub fn from_configuration(path: &Path, force_recache: bool) -> Result<Self, ToolboxError> {
        ToolboxBuilder::new(path).force_recache(force_recache).open()
    }

    /// Rebuilds a toolbox from a persisted reference without forcing a recache.
    ///
    /// # Errors
    ///
    /// See [`ToolboxBuilder::open`].
    pub fn from_persisted_reference(reference: &PersistedReference) -> Result<Self, ToolboxError> {
        Self::from_configuration(&reference.config, false)
    }

    /// Returns a reference that rebuilds this toolbox.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::MissingInformation`] when the cached
    /// configuration path is gone.
    pub fn persisted_reference(&self) -> Result<PersistedReference, ToolboxError> {
        let config = self.metadata.get_string(MetadataKey::ConfigFile)?.ok_or_else(|| {
            ToolboxError::MissingInformation("TOOL_CONFIG_FILE is not cached".to_string())
        })?;
        Ok(PersistedReference {
            config: PathBuf::from(config),
        })
    }

    /// Returns the tool id.
    #[must_use]
    pub const fn tool_id(&self) -> &ToolId {
        &self.report.tool_id
    }

    /// Returns the outcome of the loader run that opened this toolbox.
    #[must_use]
    pub const fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// Reads the cached metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Storage`] when the store fails.
    pub fn metadata(&self) -> Result<ToolMetadata, ToolboxError> {
        Ok(self.metadata.snapshot()?)
    }

    /// Returns the tool log.
    #[must_use]
    pub const fn log(&self) -> &ToolLog {
        &self.log
    }

    /// Returns the handler URL map.
    #[must_use]
    pub const fn handlers(&self) -> &HandlerUrlMap {
        &self.handlers
    }

    // ------------------------------------------------------------------------
    // LTI
    // ------------------------------------------------------------------------

    /// Returns true when `request` is an LTI launch.
    #[must_use]
    pub fn is_launching(request: &LaunchRequest) -> bool {
        request.is_launching()
    }

    /// Returns a dispatcher for one inbound request.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidToolProvider`] when the cached
    /// metadata lacks a tool id, launch URL, or handler map.
    pub fn dispatcher<'a>(
        &'a self,
        validator: &'a dyn LaunchValidator,
    ) -> Result<LaunchDispatcher<'a>, ToolboxError> {
        if !self.metadata()?.is_dispatchable() {
            return Err(ConfigurationError::InvalidToolProvider(
                "tool id, launch url, and handler urls must be configured".to_string(),
            )
            .into());
        }
        Ok(LaunchDispatcher::new(&self.handlers, validator, &self.log))
    }

    /// Creates a consumer; returns false when the name already exists.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Storage`] when the connector fails.
    pub fn create_consumer(
        &self,
        name: &str,
        key: Option<&str>,
        secret: Option<&str>,
    ) -> Result<bool, ToolboxError> {
        Ok(self.registry().create_consumer(name, key, secret)?)
    }

    /// Lists consumers.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Storage`] when the connector fails.
    pub fn list_consumers(&self) -> Result<Vec<ToolConsumer>, ToolboxError> {
        Ok(self.registry().list_consumers()?)
    }

    /// Returns the consumer registry.
    #[must_use]
    pub fn registry(&self) -> ConsumerRegistry<'_> {
        ConsumerRegistry::new(self.consumers.as_ref(), &self.log)
    }

    // ------------------------------------------------------------------------
    // LMS API
    // ------------------------------------------------------------------------

    /// Returns the LMS API client, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidCanvasCredentials`] when the
    /// cached credentials are incomplete.
    pub fn api(&self) -> Result<Arc<dyn LmsApi>, ToolboxError> {
        let mut slot = self
            .api
            .lock()
            .map_err(|_| ApiError::Transport("api client mutex poisoned".to_string()))?;
        if let Some(api) = slot.as_ref() {
            return Ok(Arc::clone(api));
        }
        let credentials = self
            .metadata
            .get_typed::<CanvasCredentials>(MetadataKey::CanvasApi)?
            .unwrap_or_default();
        let client: Arc<dyn LmsApi> =
            Arc::new(CanvasClient::new(&credentials, self.api_config.clone())?);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Sends a GET request to the LMS API.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Api`] when the call fails.
    pub fn api_get(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ToolboxError> {
        Ok(self.api()?.get(path, params, headers)?)
    }

    /// Sends a POST request to the LMS API.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Api`] when the call fails.
    pub fn api_post(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ToolboxError> {
        Ok(self.api()?.post(path, params, headers)?)
    }

    /// Sends a PUT request to the LMS API.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Api`] when the call fails.
    pub fn api_put(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ToolboxError> {
        Ok(self.api()?.put(path, params, headers)?)
    }

    /// Sends a DELETE request to the LMS API.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Api`] when the call fails.
    pub fn api_delete(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ToolboxError> {
        Ok(self.api()?.delete(path, params, headers)?)
    }

    /// Returns the Canvas roles available in the user's account, keyed by
    /// role id. Results are cached for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::MissingInformation`] when neither an account
    /// nor a course id is known, and API or storage errors otherwise.
    pub fn canvas_roles(&self, user: &CanvasUser) -> Result<BTreeMap<String, Value>, ToolboxError> {
        let account_id = match user.canvas.get("account_id").filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => {
                let course_id =
                    user.canvas.get("course_id").filter(|id| !id.is_empty()).ok_or_else(|| {
                        ToolboxError::MissingInformation(
                            "neither account_id nor course_id is known".to_string(),
                        )
                    })?;
                let course = self.api_get(&format!("courses/{course_id}"), &[], &[])?;
                json_id(course.get("account_id")).ok_or_else(|| {
                    ToolboxError::MissingInformation(format!(
                        "course {course_id} has no account_id"
                    ))
                })?
            }
        };
        let cache_key = format!("account-roles/{account_id}");
        if let Some(roles) = self.cache.get(&cache_key)? {
            return Ok(roles);
        }
        let response = self.api_get(
            &format!("accounts/{account_id}/roles"),
            &[("show_inherited".to_string(), "true".to_string())],
            &[],
        )?;
        let roles: BTreeMap<String, Value> = response
            .as_array()
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(|role| json_id(role.get("id")).map(|id| (id, role.clone())))
                    .collect()
            })
            .unwrap_or_default();
        self.cache.set(&cache_key, &roles)?;
        Ok(roles)
    }

    // ------------------------------------------------------------------------
    // Storage and Output
    // ------------------------------------------------------------------------

    /// Runs a raw query against the storage engine.
    ///
    /// # Errors
    ///
    /// Returns [`ToolboxError::Storage`] when the engine fails or does not
    /// support queries.
    pub fn query(&self, sql: &str) -> Result<Vec<QueryRow>, ToolboxError> {
        Ok(self.storage.query(sql)?)
    }

    /// Returns the cartridge XML generator for the cached metadata.
    ///
    /// # Errors
    ///
    /// Returns the generator's [`ConfigurationError`] validation failures.
    pub fn generator(&self) -> Result<Generator, ToolboxError> {
        Ok(Generator::from_metadata(&self.metadata()?)?)
    }

    /// Renders the configuration XML.
    ///
    /// # Errors
    ///
    /// See [`Toolbox::generator`].
    pub fn configuration_xml(&self) -> Result<String, ToolboxError> {
        Ok(self.generator()?.save_xml())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the SQLite store named by `[storage]`.
fn open_sqlite(loaded: &LoadedConfig) -> Result<ToolboxBackend, ConfigurationError> {
    let config = loaded.config.storage.store_config(&loaded.directory);
    SqliteStorage::open(config)
        .map(ToolboxBackend::sqlite)
        .map_err(|err| ConfigurationError::StorageUnavailable(err.to_string()))
}

/// Reads a Canvas id that may be a number or a string.
fn json_id(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}
