// crates/lti-toolbox-core/src/core/errors.rs
// ============================================================================
// Module: LTI Toolbox Configuration Errors
// Description: Error taxonomy for configuration loading and XML generation.
// Purpose: Give loaders and generators one fail-closed error vocabulary.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Configuration errors are fatal to the current request and are never
//! retried automatically. Variants are stable for programmatic handling.

use thiserror::Error;

/// Configuration errors raised while loading, caching, or emitting tool configuration.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Configuration description could not be read or parsed.
    #[error("configuration parse failure: {0}")]
    ParseFailure(String),
    /// Storage engine connection could not be established.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// No handler/URL pairs were configured.
    #[error("at least one handler/url pair must be specified")]
    MissingHandlers,
    /// A handler key did not name a known LTI request type.
    #[error("unknown lti request type: {0}")]
    UnknownRequestType(String),
    /// The Canvas API credentials block was empty.
    #[error("canvas api credentials must be provided")]
    MissingCanvasCredentials,
    /// Canvas API credentials are present but incomplete.
    #[error("canvas url and token required: {0}")]
    InvalidCanvasCredentials(String),
    /// Launch privacy value is not a recognized level.
    #[error("invalid launch privacy setting: {0}")]
    InvalidPrivacyLevel(String),
    /// Placement option name is not a recognized extension point.
    #[error("invalid configuration option: {0}")]
    InvalidOption(String),
    /// Tool identity (name, id, launch url) is incomplete.
    #[error("invalid tool provider: {0}")]
    InvalidToolProvider(String),
    /// Tool log file could not be prepared.
    #[error("tool log unavailable: {0}")]
    LogUnavailable(String),
}
