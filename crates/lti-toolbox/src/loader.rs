// crates/lti-toolbox/src/loader.rs
// ============================================================================
// Module: Configuration Loader
// Description: Synchronizes the metadata store with a configuration description.
// Purpose: Populate tool identity, log, handler, and Canvas metadata groups.
// Dependencies: serde_json, lti-toolbox-config, lti-toolbox-core
// ============================================================================

//! ## Overview
//! The loader treats the configuration description as authoritative and the
//! metadata store as its cache. Four groups are refreshed independently:
//!
//! | Group | Refreshed when |
//! |---|---|
//! | identity | forced, or any of `TOOL_ID`, `TOOL_LAUNCH_URL`, `TOOL_CONFIG_FILE` is empty |
//! | log | forced, or `TOOL_LOG` is empty |
//! | handlers | forced, or `TOOL_HANDLER_URLS` is empty |
//! | canvas | forced, or `TOOL_CANVAS_API` is empty |
//!
//! Every due group is planned and validated, and the log file opened, before
//! anything is written, so a failing group (for example no handlers) or an
//! unwritable log leaves the store untouched. Once writes begin a failure to
//! flush the buffered log records is still reported, but the written groups
//! stay cached.
//! Messages emitted before the log file is known sit in the tool log's
//! buffer and are flushed once it goes live.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::path::PathBuf;

use lti_toolbox_config::DEFAULT_LOG_PATH;
use lti_toolbox_config::LoadedConfig;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::HandlerUrlMap;
use lti_toolbox_core::MetadataKey;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolId;
use lti_toolbox_core::hashing::derive_tool_id;
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolboxError;
use crate::log::LogError;
use crate::log::ToolLog;
use crate::metadata::MetadataStore;
use crate::url::UrlResolver;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Options for one loader run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Refresh every group regardless of what is cached.
    pub force_recache: bool,
    /// URL of the executing entry point, used as the launch URL when the
    /// description names no `authenticate` path.
    pub script_url: Option<String>,
}

/// Independently refreshed metadata groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataGroup {
    /// Tool id, name, description, icon, privacy, domain, launch URL, placements.
    Identity,
    /// Log file path.
    Log,
    /// Handler URL map.
    Handlers,
    /// Canvas API credentials.
    CanvasApi,
}

/// Outcome of a loader run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Resolved tool id.
    pub tool_id: ToolId,
    /// True when the id was derived from the description rather than given.
    pub id_derived: bool,
    /// Groups written during this run, in refresh order.
    pub refreshed: Vec<MetadataGroup>,
    /// Log file the tool log writes to.
    pub log_path: PathBuf,
}

/// A single pending metadata mutation.
#[derive(Debug, Clone, PartialEq)]
enum Mutation {
    /// Store a value.
    Set(MetadataKey, Value),
    /// Remove a stale key.
    Clear(MetadataKey),
}

/// Validated writes for one group.
#[derive(Debug)]
struct GroupPlan {
    /// Group being refreshed.
    group: MetadataGroup,
    /// Mutations to apply.
    mutations: Vec<Mutation>,
}

// ============================================================================
// SECTION: Tool Id
// ============================================================================

/// Resolves the tool id: the explicit id, or one derived from the directory
/// name and file contents. The flag is true when derived.
#[must_use]
pub fn resolve_tool_id(loaded: &LoadedConfig) -> (ToolId, bool) {
    loaded.config.tool.explicit_id().map_or_else(
        || (derive_tool_id(&loaded.directory_name(), loaded.contents.as_bytes()), true),
        |id| (ToolId::new(id), false),
    )
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Synchronizes `metadata` with `loaded`.
///
/// # Errors
///
/// Returns [`ToolboxError::Configuration`] when a due group is invalid
/// (`MissingHandlers`, `UnknownRequestType`, `MissingCanvasCredentials`,
/// `InvalidToolProvider`, `LogUnavailable`) and [`ToolboxError::Storage`]
/// when the store fails.
pub fn load_configuration(
    loaded: &LoadedConfig,
    metadata: &MetadataStore,
    log: &ToolLog,
    options: &LoadOptions,
) -> Result<LoadReport, ToolboxError> {
    let (tool_id, id_derived) = resolve_tool_id(loaded);
    let force = options.force_recache;
    let resolver = UrlResolver::new(&loaded.directory, loaded.config.web.base_url.as_deref())?;

    let mut plans = Vec::new();
    if force || identity_missing(metadata)? {
        plans.push(plan_identity(loaded, &tool_id, &resolver, options)?);
    }
    let log_path = if force || !metadata.is_populated(MetadataKey::Log)? {
        let path = prepare_log_file(loaded)?;
        plans.push(GroupPlan {
            group: MetadataGroup::Log,
            mutations: vec![Mutation::Set(
                MetadataKey::Log,
                Value::String(path.display().to_string()),
            )],
        });
        path
    } else {
        metadata.get_string(MetadataKey::Log)?.map(PathBuf::from).ok_or_else(|| {
            ConfigurationError::LogUnavailable("cached log path is not a string".to_string())
        })?
    };
    if force || !metadata.is_populated(MetadataKey::HandlerUrls)? {
        plans.push(plan_handlers(loaded, &resolver)?);
    }
    if force || !metadata.is_populated(MetadataKey::CanvasApi)? {
        plans.push(plan_canvas(loaded)?);
    }

    let sink = ToolLog::open_file_sink(&log_path)
        .map_err(|err| ConfigurationError::LogUnavailable(err.to_string()))?;

    for plan in &plans {
        apply(metadata, &plan.mutations)?;
    }
    let refreshed: Vec<MetadataGroup> = plans.iter().map(|plan| plan.group).collect();

    if force {
        log.notice(format!("Resetting LTI configuration from {}", loaded.path.display()));
    }
    if refreshed.contains(&MetadataGroup::Identity) {
        if id_derived {
            log.info(format!("Automatically generated ID {tool_id}"));
        }
        log.info("Tool metadata configured");
    }
    match log.go_live(Box::new(sink)) {
        Ok(()) | Err(LogError::AlreadyLive) => {}
        Err(LogError::Write(err)) => return Err(ConfigurationError::LogUnavailable(err).into()),
    }
    if refreshed.contains(&MetadataGroup::Handlers) {
        log.info("Tool provider handler URLs configured");
    }
    if refreshed.contains(&MetadataGroup::CanvasApi) {
        log.info("Canvas API credentials configured");
    }

    Ok(LoadReport {
        tool_id,
        id_derived,
        refreshed,
        log_path,
    })
}

// ============================================================================
// SECTION: Group Plans
// ============================================================================

/// Returns true when any identity-defining key is empty.
fn identity_missing(metadata: &MetadataStore) -> Result<bool, StorageError> {
    for key in [MetadataKey::ToolId, MetadataKey::LaunchUrl, MetadataKey::ConfigFile] {
        if !metadata.is_populated(key)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Plans the identity group.
fn plan_identity(
    loaded: &LoadedConfig,
    tool_id: &ToolId,
    resolver: &UrlResolver,
    options: &LoadOptions,
) -> Result<GroupPlan, ToolboxError> {
    let tool = &loaded.config.tool;
    let name = non_blank(tool.name.as_deref()).unwrap_or_else(|| tool_id.as_str());
    let authenticate = non_blank(tool.authenticate.as_deref());
    let launch_url = match (authenticate, options.script_url.as_deref()) {
        (Some(path), _) => resolver.resolve(path)?,
        (None, Some(script)) if !script.trim().is_empty() => resolver.resolve(script)?,
        (None, _) => {
            return Err(ConfigurationError::InvalidToolProvider(
                "launch url requires tool.authenticate or an entry-point url".to_string(),
            )
            .into());
        }
    };
    let privacy = non_blank(tool.launch_privacy.as_deref()).unwrap_or("public");

    let mut mutations = vec![
        Mutation::Set(MetadataKey::ToolId, Value::String(tool_id.to_string())),
        Mutation::Set(MetadataKey::ToolName, Value::String(name.to_string())),
        Mutation::Set(MetadataKey::ConfigFile, Value::String(loaded.path.display().to_string())),
    ];
    mutations.push(optional(MetadataKey::Description, non_blank(tool.description.as_deref())));
    let icon = non_blank(tool.icon.as_deref()).map(|icon| resolver.resolve_icon(icon)).transpose()?;
    mutations.push(optional(MetadataKey::IconUrl, icon.as_deref()));
    mutations.push(Mutation::Set(MetadataKey::LaunchPrivacy, Value::String(privacy.to_string())));
    mutations.push(optional(MetadataKey::Domain, non_blank(tool.domain.as_deref())));
    mutations.push(Mutation::Set(MetadataKey::LaunchUrl, Value::String(launch_url)));
    if tool.placements.is_empty() {
        mutations.push(Mutation::Clear(MetadataKey::Placements));
    } else {
        let placements = serde_json::to_value(&tool.placements)
            .map_err(|err| StorageError::Codec(err.to_string()))?;
        mutations.push(Mutation::Set(MetadataKey::Placements, placements));
    }
    Ok(GroupPlan {
        group: MetadataGroup::Identity,
        mutations,
    })
}

/// Resolves, touches, and canonicalizes the log file path.
fn prepare_log_file(loaded: &LoadedConfig) -> Result<PathBuf, ConfigurationError> {
    let configured = non_blank(loaded.config.tool.log.as_deref()).unwrap_or(DEFAULT_LOG_PATH);
    let path = loaded.resolve_path(configured);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| ConfigurationError::LogUnavailable(format!("{}: {err}", path.display())))?;
    path.canonicalize()
        .map_err(|err| ConfigurationError::LogUnavailable(format!("{}: {err}", path.display())))
}

/// Plans the handler URL group.
fn plan_handlers(loaded: &LoadedConfig, resolver: &UrlResolver) -> Result<GroupPlan, ToolboxError> {
    let entries = &loaded.config.tool.handlers;
    if entries.is_empty() {
        return Err(ConfigurationError::MissingHandlers.into());
    }
    let resolved = entries
        .iter()
        .map(|(key, path)| Ok((key.as_str(), resolver.resolve(path)?)))
        .collect::<Result<Vec<_>, ConfigurationError>>()?;
    let handlers = HandlerUrlMap::from_entries(resolved)?;
    let value =
        serde_json::to_value(&handlers).map_err(|err| StorageError::Codec(err.to_string()))?;
    Ok(GroupPlan {
        group: MetadataGroup::Handlers,
        mutations: vec![Mutation::Set(MetadataKey::HandlerUrls, value)],
    })
}

/// Plans the Canvas API credentials group.
fn plan_canvas(loaded: &LoadedConfig) -> Result<GroupPlan, ToolboxError> {
    let credentials = loaded
        .config
        .canvas
        .as_ref()
        .map(lti_toolbox_config::CanvasConfig::credentials)
        .filter(|credentials| !credentials.is_empty())
        .ok_or(ConfigurationError::MissingCanvasCredentials)?;
    let value =
        serde_json::to_value(&credentials).map_err(|err| StorageError::Codec(err.to_string()))?;
    Ok(GroupPlan {
        group: MetadataGroup::CanvasApi,
        mutations: vec![Mutation::Set(MetadataKey::CanvasApi, value)],
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Applies mutations in order.
fn apply(metadata: &MetadataStore, mutations: &[Mutation]) -> Result<(), StorageError> {
    for mutation in mutations {
        match mutation {
            Mutation::Set(key, value) => metadata.set(*key, value)?,
            Mutation::Clear(key) => {
                metadata.clear(*key)?;
            }
        }
    }
    Ok(())
}

/// Sets `key` when `value` is present, otherwise clears it.
fn optional(key: MetadataKey, value: Option<&str>) -> Mutation {
    value.map_or(Mutation::Clear(key), |value| Mutation::Set(key, Value::String(value.to_string())))
}

/// Returns the trimmed value when it is not blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
