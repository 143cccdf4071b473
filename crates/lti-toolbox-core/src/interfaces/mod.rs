// crates/lti-toolbox-core/src/interfaces/mod.rs
// ============================================================================
// Module: LTI Toolbox Interfaces
// Description: Collaborator contracts for storage, consumers, launches, and LMS APIs.
// Purpose: Define the seams the toolbox service is wired against.
// Dependencies: serde, serde_json, thiserror, crate::core
// ============================================================================

//! ## Overview
//! The toolbox never talks to a database, an OAuth library, or the LMS
//! directly. It depends on four collaborator traits:
//! - [`StorageEngine`]: namespaced key/value storage with expiry and raw query.
//! - [`ConsumerConnector`]: persistence for Tool Consumer trust records.
//! - [`LaunchValidator`]: signature, nonce, and timestamp validation.
//! - [`LmsApi`]: verb-based LMS REST access.
//!
//! Security posture: launch parameters and LMS responses are untrusted.
//! Validators and API clients must fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::ConsumerKey;
use crate::core::launch::LaunchRequest;
use crate::core::launch::LtiUser;
use crate::core::launch::ResourceLink;
use crate::core::launch::ToolConsumer;

// ============================================================================
// SECTION: Storage Engine
// ============================================================================

/// One row returned by a raw storage query.
pub type QueryRow = Map<String, Value>;

/// Storage engine errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Storage engine could not be reached or opened.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// Storage engine reported an error.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// Stored value could not be encoded or decoded.
    #[error("storage codec error: {0}")]
    Codec(String),
    /// Operation is not supported by this engine.
    #[error("storage operation unsupported: {0}")]
    Unsupported(String),
}

/// Namespaced key/value storage with optional expiry.
///
/// # Invariants
/// - Reads never return entries whose expiry has passed.
/// - Namespaces are fully isolated from one another.
pub trait StorageEngine: Send + Sync {
    /// Loads a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the read fails.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Stores a value, replacing any previous value. `ttl` of `None` never expires.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn set(
        &self,
        namespace: &str,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;

    /// Removes a value, returning true when a live entry existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the delete fails.
    fn delete(&self, namespace: &str, key: &str) -> Result<bool, StorageError>;

    /// Evicts expired entries, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the purge fails.
    fn purge_expired(&self) -> Result<usize, StorageError>;

    /// Executes a raw query and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unsupported`] for engines without a query
    /// language, or [`StorageError`] when the query fails.
    fn query(&self, sql: &str) -> Result<Vec<QueryRow>, StorageError>;
}

// ============================================================================
// SECTION: Consumer Connector
// ============================================================================

/// Persistence for Tool Consumer records.
pub trait ConsumerConnector: Send + Sync {
    /// Lists every consumer in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the listing fails.
    fn list_consumers(&self) -> Result<Vec<ToolConsumer>, StorageError>;

    /// Inserts or replaces a consumer keyed by its consumer key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the write fails.
    fn save_consumer(&self, consumer: &ToolConsumer) -> Result<(), StorageError>;

    /// Loads a consumer by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the read fails.
    fn load_consumer(&self, key: &ConsumerKey) -> Result<Option<ToolConsumer>, StorageError>;
}

// ============================================================================
// SECTION: Launch Validation
// ============================================================================

/// Launch authentication failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - A failed launch is never treated as anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// OAuth signature did not verify.
    #[error("invalid launch signature: {0}")]
    InvalidSignature(String),
    /// Nonce was already used.
    #[error("replayed launch nonce: {0}")]
    ReplayedNonce(String),
    /// Consumer key is unknown or disabled.
    #[error("unknown tool consumer: {0}")]
    UnknownConsumer(String),
    /// Timestamp is outside the accepted window.
    #[error("expired launch timestamp: {0}")]
    ExpiredTimestamp(String),
    /// Message-type marker is absent or not serviced by the tool.
    #[error("unsupported lti message type: {0}")]
    UnsupportedMessageType(String),
}

impl AuthError {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::InvalidSignature(_) => "invalid_signature",
            Self::ReplayedNonce(_) => "replayed_nonce",
            Self::UnknownConsumer(_) => "unknown_consumer",
            Self::ExpiredTimestamp(_) => "expired_timestamp",
            Self::UnsupportedMessageType(_) => "unsupported_message_type",
        }
    }
}

/// Entities resolved by a successful launch validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLaunch {
    /// Consumer the launch came from.
    pub consumer: ToolConsumer,
    /// User asserted by the launch.
    pub user: LtiUser,
    /// Resource link the launch came from.
    pub resource_link: ResourceLink,
}

/// Validates inbound signed launches.
pub trait LaunchValidator {
    /// Validates signature, nonce, timestamp, and consumer of a launch.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the launch is not trustworthy.
    fn validate_launch(&self, request: &LaunchRequest) -> Result<ValidatedLaunch, AuthError>;
}

// ============================================================================
// SECTION: LMS API
// ============================================================================

/// LMS API call failures.
///
/// # Invariants
/// - `Status` carries the parsed response body when the LMS returned JSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Request could not be sent or the connection failed.
    #[error("lms api transport error: {0}")]
    Transport(String),
    /// LMS answered with a non-success status.
    #[error("lms api returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Parsed response body, when available.
        body: Option<Value>,
    },
    /// Response body could not be decoded.
    #[error("lms api decode error: {0}")]
    Decode(String),
}

/// HTTP verbs supported by [`LmsApi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// PUT.
    Put,
    /// DELETE.
    Delete,
}

impl HttpMethod {
    /// Returns the method token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Verb-based LMS REST access returning parsed JSON.
pub trait LmsApi: Send + Sync {
    /// Sends a request to `path` (relative to the API base).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails or the LMS rejects it.
    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError>;

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails.
    fn get(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.request(HttpMethod::Get, path, params, headers)
    }

    /// Sends a POST request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails.
    fn post(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.request(HttpMethod::Post, path, params, headers)
    }

    /// Sends a PUT request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails.
    fn put(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.request(HttpMethod::Put, path, params, headers)
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails.
    fn delete(
        &self,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.request(HttpMethod::Delete, path, params, headers)
    }
}
