// crates/lti-toolbox-core/src/runtime/store.rs
// ============================================================================
// Module: LTI Toolbox In-Memory Store
// Description: In-memory storage engine and consumer connector.
// Purpose: Provide deterministic collaborators without external deps.
// Dependencies: serde_json, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! This module provides in-memory implementations of [`StorageEngine`] and
//! [`ConsumerConnector`] for tests and local demos. Clones share state. It is
//! not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::core::identifiers::ConsumerKey;
use crate::core::launch::ToolConsumer;
use crate::core::time::expiry_after;
use crate::core::time::now_unix_millis;
use crate::interfaces::ConsumerConnector;
use crate::interfaces::QueryRow;
use crate::interfaces::StorageEngine;
use crate::interfaces::StorageError;

// ============================================================================
// SECTION: In-Memory Storage
// ============================================================================

/// Stored value with optional expiry.
#[derive(Debug, Clone)]
struct Entry {
    /// Stored JSON value.
    value: Value,
    /// Expiry in unix milliseconds, if any.
    expires_at_ms: Option<i64>,
}

impl Entry {
    /// Returns true when the entry has expired at `now_ms`.
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_some_and(|expires| expires <= now_ms)
    }
}

/// In-memory storage engine for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    /// Entries keyed by `(namespace, key)`.
    entries: Arc<Mutex<BTreeMap<(String, String), Entry>>>,
}

impl InMemoryStorage {
    /// Creates an empty in-memory storage engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageEngine for InMemoryStorage {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("in-memory storage mutex poisoned".to_string()))?;
        let now_ms = now_unix_millis();
        Ok(guard
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| entry.value.clone()))
    }

    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at_ms = ttl.map(|ttl| expiry_after(now_unix_millis(), ttl));
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend("in-memory storage mutex poisoned".to_string()))?
            .insert((namespace.to_string(), key.to_string()), Entry {
                value: value.clone(),
                expires_at_ms,
            });
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError> {
        let removed = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("in-memory storage mutex poisoned".to_string()))?
            .remove(&(namespace.to_string(), key.to_string()));
        let now_ms = now_unix_millis();
        Ok(removed.is_some_and(|entry| !entry.is_expired(now_ms)))
    }

    fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| StorageError::Backend("in-memory storage mutex poisoned".to_string()))?;
        let now_ms = now_unix_millis();
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now_ms));
        Ok(before - guard.len())
    }

    fn query(&self, _sql: &str) -> Result<Vec<QueryRow>, StorageError> {
        Err(StorageError::Unsupported("in-memory storage has no query language".to_string()))
    }
}

// ============================================================================
// SECTION: In-Memory Consumers
// ============================================================================

/// In-memory consumer connector for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConsumers {
    /// Consumers in insertion order.
    consumers: Arc<Mutex<Vec<ToolConsumer>>>,
}

impl InMemoryConsumers {
    /// Creates an empty consumer connector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConsumerConnector for InMemoryConsumers {
    fn list_consumers(&self) -> Result<Vec<ToolConsumer>, StorageError> {
        let guard = self
            .consumers
            .lock()
            .map_err(|_| StorageError::Backend("in-memory consumers mutex poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save_consumer(&self, consumer: &ToolConsumer) -> Result<(), StorageError> {
        let mut guard = self
            .consumers
            .lock()
            .map_err(|_| StorageError::Backend("in-memory consumers mutex poisoned".to_string()))?;
        if let Some(existing) = guard.iter_mut().find(|existing| existing.key == consumer.key) {
            *existing = consumer.clone();
        } else {
            guard.push(consumer.clone());
        }
        Ok(())
    }

    fn load_consumer(&self, key: &ConsumerKey) -> Result<Option<ToolConsumer>, StorageError> {
        let guard = self
            .consumers
            .lock()
            .map_err(|_| StorageError::Backend("in-memory consumers mutex poisoned".to_string()))?;
        Ok(guard.iter().find(|consumer| consumer.key == *key).cloned())
    }
}
