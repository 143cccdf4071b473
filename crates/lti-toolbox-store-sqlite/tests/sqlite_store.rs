// crates/lti-toolbox-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite StorageEngine and ConsumerConnector behavior.
// Purpose: Ensure durable persistence, expiry, and raw query results.
// Dependencies: lti-toolbox-store-sqlite, lti-toolbox-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed toolbox store: namespace
//! isolation, TTL expiry and purge, persistence across instances, consumer
//! upserts, raw queries, and schema version checks.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::thread;
use std::time::Duration;

use lti_toolbox_core::ConsumerConnector;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::StorageEngine;
use lti_toolbox_core::StorageError;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_store_sqlite::SqliteStorage;
use lti_toolbox_store_sqlite::SqliteStoreConfig;
use lti_toolbox_store_sqlite::SqliteStoreError;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(path: &Path) -> SqliteStorage {
    SqliteStorage::open(SqliteStoreConfig::new(path)).expect("open store")
}

fn consumer(key: &str, name: &str, created_at_ms: i64) -> ToolConsumer {
    ToolConsumer {
        key: ConsumerKey::new(key),
        name: name.to_string(),
        secret: format!("{key}-secret"),
        enabled: true,
        created_at_ms,
    }
}

// ============================================================================
// SECTION: Key/Value
// ============================================================================

#[test]
fn sqlite_store_roundtrips_json_values() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    let value = json!({"base": "https://app.example/", "launch": "https://app.example/l"});
    store.set("tool-1", "TOOL_HANDLER_URLS", &value, None).unwrap();
    assert_eq!(store.get("tool-1", "TOOL_HANDLER_URLS").unwrap(), Some(value));
    assert_eq!(store.get("tool-2", "TOOL_HANDLER_URLS").unwrap(), None);
}

#[test]
fn sqlite_store_overwrites_existing_key() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    store.set("tool-1", "TOOL_NAME", &json!("First"), None).unwrap();
    store.set("tool-1", "TOOL_NAME", &json!("Second"), None).unwrap();
    assert_eq!(store.get("tool-1", "TOOL_NAME").unwrap(), Some(json!("Second")));
    let rows = store.query("SELECT COUNT(*) AS n FROM tool_metadata").unwrap();
    assert_eq!(rows[0].get("n"), Some(&json!(1)));
}

#[test]
fn sqlite_store_delete_reports_existence() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    store.set("tool-1", "TOOL_DOMAIN", &json!("example.edu"), None).unwrap();
    assert!(store.delete("tool-1", "TOOL_DOMAIN").unwrap());
    assert!(!store.delete("tool-1", "TOOL_DOMAIN").unwrap());
}

#[test]
fn sqlite_store_persists_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("toolbox.db");
    {
        let store = store_for(&path);
        store.set("tool-1", "TOOL_ID", &json!("tool-1"), None).unwrap();
        store.save_consumer(&consumer("k1", "Example Consumer", 10)).unwrap();
    }
    let store = store_for(&path);
    assert_eq!(store.get("tool-1", "TOOL_ID").unwrap(), Some(json!("tool-1")));
    assert_eq!(store.list_consumers().unwrap().len(), 1);
}

// ============================================================================
// SECTION: Expiry
// ============================================================================

#[test]
fn sqlite_store_hides_and_purges_expired_rows() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    store
        .set("cache/tool-1", "roles", &json!({"1": {"id": 1}}), Some(Duration::from_millis(1)))
        .unwrap();
    store.set("cache/tool-1", "fresh", &json!(1), Some(Duration::from_secs(600))).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(store.get("cache/tool-1", "roles").unwrap(), None);
    assert!(!store.delete("cache/tool-1", "roles").unwrap());
    store.set("cache/tool-1", "stale", &json!(2), Some(Duration::from_millis(1))).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert_eq!(store.purge_expired().unwrap(), 1);
    assert_eq!(store.get("cache/tool-1", "fresh").unwrap(), Some(json!(1)));
}

// ============================================================================
// SECTION: Consumers
// ============================================================================

#[test]
fn sqlite_store_lists_consumers_in_creation_order() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    store.save_consumer(&consumer("k2", "Second", 20)).unwrap();
    store.save_consumer(&consumer("k1", "First", 10)).unwrap();
    let names: Vec<String> =
        store.list_consumers().unwrap().into_iter().map(|consumer| consumer.name).collect();
    assert_eq!(names, vec!["First".to_string(), "Second".to_string()]);
}

#[test]
fn sqlite_store_upserts_consumer_by_key() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    store.save_consumer(&consumer("k1", "First", 10)).unwrap();
    let mut disabled = consumer("k1", "First", 10);
    disabled.enabled = false;
    store.save_consumer(&disabled).unwrap();
    let loaded = store.load_consumer(&ConsumerKey::new("k1")).unwrap().unwrap();
    assert!(!loaded.enabled);
    assert_eq!(store.list_consumers().unwrap().len(), 1);
    assert_eq!(store.load_consumer(&ConsumerKey::new("missing")).unwrap(), None);
}

// ============================================================================
// SECTION: Raw Query
// ============================================================================

#[test]
fn sqlite_store_query_returns_typed_columns() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    let rows = store.query("SELECT 1 AS i, 1.5 AS r, 'x' AS t, NULL AS n, x'0102' AS b").unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("i"), Some(&json!(1)));
    assert_eq!(row.get("r"), Some(&json!(1.5)));
    assert_eq!(row.get("t"), Some(&json!("x")));
    assert_eq!(row.get("n"), Some(&json!(null)));
    assert_eq!(row.get("b"), Some(&json!("AQI=")));
}

#[test]
fn sqlite_store_query_surfaces_sql_errors() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("toolbox.db"));
    assert!(matches!(store.query("SELECT * FROM missing_table"), Err(StorageError::Backend(_))));
}

// ============================================================================
// SECTION: Schema
// ============================================================================

#[test]
fn sqlite_store_rejects_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("toolbox.db");
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute_batch(
                "CREATE TABLE store_meta (version INTEGER NOT NULL); INSERT INTO store_meta \
                 (version) VALUES (99);",
            )
            .unwrap();
    }
    let result = SqliteStorage::open(SqliteStoreConfig::new(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteStorage::open(SqliteStoreConfig::new(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}
