// crates/lti-toolbox-core/src/runtime/mod.rs
// ============================================================================
// Module: LTI Toolbox Runtime Helpers
// Description: In-memory collaborator implementations.
// Purpose: Back tests and local demos without an external database.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Runtime helpers implement the collaborator interfaces in memory.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::InMemoryConsumers;
pub use store::InMemoryStorage;
