// crates/lti-toolbox-core/src/lib.rs
// ============================================================================
// Module: LTI Toolbox Core Library
// Description: Public API surface for the LTI Toolbox core.
// Purpose: Expose domain types, collaborator interfaces, and in-memory runtimes.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! LTI Toolbox core models a Tool Provider sitting between a Canvas Tool
//! Consumer and a downstream application: tool metadata, handler URL
//! resolution, the LTI launch model, and the collaborator interfaces
//! (storage engine, consumer connector, launch validator, LMS API) the
//! service crate is wired against. It performs no I/O of its own.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ApiError;
pub use interfaces::AuthError;
pub use interfaces::ConsumerConnector;
pub use interfaces::HttpMethod;
pub use interfaces::LaunchValidator;
pub use interfaces::LmsApi;
pub use interfaces::QueryRow;
pub use interfaces::StorageEngine;
pub use interfaces::StorageError;
pub use interfaces::ValidatedLaunch;
pub use runtime::InMemoryConsumers;
pub use runtime::InMemoryStorage;
