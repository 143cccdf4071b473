// crates/lti-toolbox/src/error.rs
// ============================================================================
// Module: LTI Toolbox Errors
// Description: Aggregate error type for toolbox operations.
// Purpose: Surface configuration, storage, auth, API, and log failures as one type.
// Dependencies: thiserror, lti-toolbox-core
// ============================================================================

//! ## Overview
//! Each collaborator keeps its own error enum; [`ToolboxError`] wraps them so
//! callers can match on the failure domain without losing the detail.

use lti_toolbox_core::ApiError;
use lti_toolbox_core::AuthError;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::StorageError;
use thiserror::Error;

use crate::log::LogError;

/// Toolbox operation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ToolboxError {
    /// Configuration could not be loaded, cached, or emitted.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Storage engine failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// Launch authentication failure.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
    /// LMS API failure.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    /// Tool log failure.
    #[error("log error: {0}")]
    Log(#[from] LogError),
    /// A lookup lacked the context it needs (for example, no account or course id).
    #[error("missing information: {0}")]
    MissingInformation(String),
}
