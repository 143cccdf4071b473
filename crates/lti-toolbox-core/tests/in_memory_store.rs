// crates/lti-toolbox-core/tests/in_memory_store.rs
// ============================================================================
// Module: In-Memory Collaborator Tests
// Description: Tests for in-memory storage expiry and consumer persistence.
// Purpose: Ensure the test collaborators honor the storage contracts.
// Dependencies: lti-toolbox-core, serde_json
// ============================================================================

//! ## Overview
//! Validates namespace isolation, TTL expiry, and consumer upserts.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::thread;
use std::time::Duration;

use lti_toolbox_core::ConsumerConnector;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::InMemoryConsumers;
use lti_toolbox_core::InMemoryStorage;
use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolConsumer;
use serde_json::json;

#[test]
fn namespaces_are_isolated() {
    let storage = InMemoryStorage::new();
    storage.set("tool-a", "TOOL_NAME", &json!("A"), None).unwrap();
    storage.set("tool-b", "TOOL_NAME", &json!("B"), None).unwrap();
    assert_eq!(storage.get("tool-a", "TOOL_NAME").unwrap(), Some(json!("A")));
    assert_eq!(storage.get("tool-b", "TOOL_NAME").unwrap(), Some(json!("B")));
    assert!(storage.delete("tool-a", "TOOL_NAME").unwrap());
    assert!(!storage.delete("tool-a", "TOOL_NAME").unwrap());
    assert_eq!(storage.get("tool-b", "TOOL_NAME").unwrap(), Some(json!("B")));
}

#[test]
fn expired_entries_are_hidden_and_purged() {
    let storage = InMemoryStorage::new();
    storage.set("cache", "roles", &json!({"1": "x"}), Some(Duration::from_millis(1))).unwrap();
    storage.set("cache", "keep", &json!(true), None).unwrap();
    thread::sleep(Duration::from_millis(10));
    assert_eq!(storage.get("cache", "roles").unwrap(), None);
    assert_eq!(storage.purge_expired().unwrap(), 1);
    assert_eq!(storage.get("cache", "keep").unwrap(), Some(json!(true)));
}

#[test]
fn raw_query_is_unsupported() {
    let storage = InMemoryStorage::new();
    assert!(matches!(storage.query("SELECT 1"), Err(StorageError::Unsupported(_))));
}

#[test]
fn consumers_upsert_by_key_and_keep_order() {
    let consumers = InMemoryConsumers::new();
    let first = ToolConsumer {
        key: ConsumerKey::new("k1"),
        name: "First".to_string(),
        secret: "s1".to_string(),
        enabled: true,
        created_at_ms: 1,
    };
    let second = ToolConsumer {
        key: ConsumerKey::new("k2"),
        name: "Second".to_string(),
        ..first.clone()
    };
    consumers.save_consumer(&first).unwrap();
    consumers.save_consumer(&second).unwrap();
    let renamed = ToolConsumer {
        name: "Renamed".to_string(),
        ..first.clone()
    };
    consumers.save_consumer(&renamed).unwrap();
    let listed = consumers.list_consumers().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "Renamed");
    assert_eq!(listed[1].name, "Second");
    assert_eq!(consumers.load_consumer(&ConsumerKey::new("k2")).unwrap(), Some(second));
    assert_eq!(consumers.load_consumer(&ConsumerKey::new("missing")).unwrap(), None);
}
