// crates/lti-toolbox/src/metadata.rs
// ============================================================================
// Module: Metadata Store
// Description: Tool-scoped key/value cache of tool configuration.
// Purpose: Read and write metadata keys under a single tool namespace.
// Dependencies: serde, serde_json, lti-toolbox-core
// ============================================================================

//! ## Overview
//! [`MetadataStore`] is a thin, namespaced view over a [`StorageEngine`].
//! Every read and write is scoped by the tool id, so tools sharing one
//! storage engine never see each other's keys. The store adds no caching of
//! its own; expiry belongs to the engine.
//!
//! Keys are the [`MetadataKey`] catalogue, never free-form strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use lti_toolbox_core::HandlerUrlMap;
use lti_toolbox_core::MetadataKey;
use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolId;
use lti_toolbox_core::ToolMetadata;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

// ============================================================================
// SECTION: Metadata Store
// ============================================================================

/// Tool-scoped metadata store.
///
/// # Invariants
/// - The storage namespace is always the tool id.
#[derive(Clone)]
pub struct MetadataStore {
    /// Backing storage engine.
    storage: Arc<dyn StorageEngine>,
    /// Tool namespace.
    tool_id: ToolId,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore").field("tool_id", &self.tool_id).finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Attaches a metadata store for `tool_id`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageEngine>, tool_id: ToolId) -> Self {
        Self {
            storage,
            tool_id,
        }
    }

    /// Returns the tool id this store is scoped to.
    #[must_use]
    pub const fn tool_id(&self) -> &ToolId {
        &self.tool_id
    }

    /// Returns the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails.
    pub fn get(&self, key: MetadataKey) -> Result<Option<Value>, StorageError> {
        self.storage.get(self.tool_id.as_str(), key.as_str())
    }

    /// Returns the value under `key` when it is a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails.
    pub fn get_string(&self, key: MetadataKey) -> Result<Option<String>, StorageError> {
        Ok(self.get(key)?.and_then(|value| match value {
            Value::String(text) if !text.is_empty() => Some(text),
            _ => None,
        }))
    }

    /// Decodes the value under `key` into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Codec`] when the stored value does not decode.
    pub fn get_typed<T: DeserializeOwned>(
        &self,
        key: MetadataKey,
    ) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StorageError::Codec(format!("{key}: {err}"))),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails.
    pub fn set(&self, key: MetadataKey, value: &Value) -> Result<(), StorageError> {
        self.storage.set(self.tool_id.as_str(), key.as_str(), value, None)
    }

    /// Encodes and stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when encoding or the engine fails.
    pub fn set_typed<T: Serialize>(&self, key: MetadataKey, value: &T) -> Result<(), StorageError> {
        let value =
            serde_json::to_value(value).map_err(|err| StorageError::Codec(err.to_string()))?;
        self.set(key, &value)
    }

    /// Removes `key`, returning true when it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails.
    pub fn clear(&self, key: MetadataKey) -> Result<bool, StorageError> {
        self.storage.delete(self.tool_id.as_str(), key.as_str())
    }

    /// Returns true when `key` holds a non-empty value.
    ///
    /// Null, empty strings, empty maps, and empty lists count as empty.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails.
    pub fn is_populated(&self, key: MetadataKey) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some_and(|value| !is_empty_value(&value)))
    }

    /// Reads every key into a typed [`ToolMetadata`] view.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails or a structured key
    /// does not decode.
    pub fn snapshot(&self) -> Result<ToolMetadata, StorageError> {
        Ok(ToolMetadata {
            id: self.get_string(MetadataKey::ToolId)?.map(ToolId::new),
            name: self.get_string(MetadataKey::ToolName)?,
            config_file: self.get_string(MetadataKey::ConfigFile)?,
            description: self.get_string(MetadataKey::Description)?,
            icon_url: self.get_string(MetadataKey::IconUrl)?,
            launch_privacy: self.get_string(MetadataKey::LaunchPrivacy)?,
            domain: self.get_string(MetadataKey::Domain)?,
            launch_url: self.get_string(MetadataKey::LaunchUrl)?,
            placements: self.get_typed(MetadataKey::Placements)?.unwrap_or_default(),
            log: self.get_string(MetadataKey::Log)?,
            handler_urls: self.get_typed::<HandlerUrlMap>(MetadataKey::HandlerUrls)?,
            canvas: self.get_typed(MetadataKey::CanvasApi)?,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for values that count as unset.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
