// crates/lti-toolbox-store-sqlite/src/lib.rs
// ============================================================================
// Module: LTI Toolbox SQLite Store
// Description: StorageEngine and ConsumerConnector backed by SQLite WAL.
// Purpose: Persist tool metadata, TTL cache entries, and Tool Consumers.
// Dependencies: lti-toolbox-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`lti_toolbox_core::StorageEngine`]
//! and [`lti_toolbox_core::ConsumerConnector`]. Values are stored as JSON
//! text with an optional expiry column; consumers live in their own table.
//! Security posture: database contents are untrusted and decoded fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_QUERY_ROWS;
pub use store::SqliteStorage;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
