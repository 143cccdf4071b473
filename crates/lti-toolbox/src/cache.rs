// crates/lti-toolbox/src/cache.rs
// ============================================================================
// Module: Tool Cache
// Description: TTL-scoped cache of LMS lookups shared across requests.
// Purpose: Avoid repeating Canvas API calls whose answers change rarely.
// Dependencies: serde, serde_json, lti-toolbox-core
// ============================================================================

//! ## Overview
//! Entries live in the `cache/<tool id>` namespace of the storage engine,
//! apart from the metadata namespace, and expire after the configured TTL.
//! Expired entries are invisible to reads and removed by the engine's purge.

use std::sync::Arc;
use std::time::Duration;

use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolId;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Namespace prefix for cache entries.
pub const CACHE_NAMESPACE_PREFIX: &str = "cache/";

/// TTL-scoped per-tool cache.
#[derive(Clone)]
pub struct ToolCache {
    /// Backing storage engine.
    storage: Arc<dyn StorageEngine>,
    /// `cache/<tool id>`.
    namespace: String,
    /// Entry lifetime.
    ttl: Duration,
}

impl std::fmt::Debug for ToolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCache")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ToolCache {
    /// Creates the cache for `tool_id`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageEngine>, tool_id: &ToolId, ttl: Duration) -> Self {
        Self {
            storage,
            namespace: format!("{CACHE_NAMESPACE_PREFIX}{tool_id}"),
            ttl,
        }
    }

    /// Returns the live entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the engine fails or the entry does not
    /// decode into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.storage
            .get(&self.namespace, key)?
            .map(|value| {
                serde_json::from_value(value).map_err(|err| StorageError::Codec(err.to_string()))
            })
            .transpose()
    }

    /// Stores `value` under `key` for the cache TTL.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when encoding or the engine fails.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value =
            serde_json::to_value(value).map_err(|err| StorageError::Codec(err.to_string()))?;
        self.storage.set(&self.namespace, key, &value, Some(self.ttl))
    }
}
