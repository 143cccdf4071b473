// crates/lti-toolbox-core/src/core/handlers.rs
// ============================================================================
// Module: LTI Handler Routing
// Description: LTI request types, message types, and handler URL resolution.
// Purpose: Map each request type to the downstream URL that services it.
// Dependencies: serde, crate::core::errors
// ============================================================================

//! ## Overview
//! A [`HandlerUrlMap`] is built once from the ordered handler entries of the
//! configuration description. The `base` entry is always present after
//! construction: when absent it defaults to the first configured URL with its
//! query string removed. Request types without an explicit handler resolve to
//! `<base>?lti-request=<type>`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::ConfigurationError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Query parameter appended to the base URL for request types without a handler.
pub const LTI_REQUEST_PARAM: &str = "lti-request";

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Request types a handler URL can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestType {
    /// Fallback URL for every request type without an explicit handler.
    Base,
    /// Basic LTI launch.
    Launch,
    /// Dashboard request.
    Dashboard,
    /// Content-item selection request.
    ContentItem,
    /// Configure launch request.
    Configure,
    /// Rejection redirect used when authentication fails.
    Error,
}

impl RequestType {
    /// Every request type in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Base,
        Self::Launch,
        Self::Dashboard,
        Self::ContentItem,
        Self::Configure,
        Self::Error,
    ];

    /// Returns the canonical lowercase token for the request type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Launch => "launch",
            Self::Dashboard => "dashboard",
            Self::ContentItem => "content-item",
            Self::Configure => "configure",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ConfigurationError;

    /// Parses a handler key, ignoring ASCII case and surrounding whitespace.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let token = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == token)
            .ok_or_else(|| ConfigurationError::UnknownRequestType(value.to_string()))
    }
}

// ============================================================================
// SECTION: Message Types
// ============================================================================

/// Classified inbound LTI message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    /// `basic-lti-launch-request`.
    Launch,
    /// `DashboardRequest`.
    Dashboard,
    /// `ConfigureLaunchRequest`.
    Configure,
    /// `ContentItemSelectionRequest`.
    ContentItem,
    /// Authentication failure; never produced from an inbound marker.
    Error,
}

impl MessageType {
    /// Classifies an `lti_message_type` parameter value.
    ///
    /// Returns `None` for markers the tool does not service.
    #[must_use]
    pub fn from_lti_message_type(value: &str) -> Option<Self> {
        match value.trim() {
            "basic-lti-launch-request" => Some(Self::Launch),
            "DashboardRequest" => Some(Self::Dashboard),
            "ConfigureLaunchRequest" => Some(Self::Configure),
            "ContentItemSelectionRequest" => Some(Self::ContentItem),
            _ => None,
        }
    }

    /// Returns the handler request type that services this message.
    #[must_use]
    pub const fn request_type(self) -> RequestType {
        match self {
            Self::Launch => RequestType::Launch,
            Self::Dashboard => RequestType::Dashboard,
            Self::Configure => RequestType::Configure,
            Self::ContentItem => RequestType::ContentItem,
            Self::Error => RequestType::Error,
        }
    }

    /// Returns the stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.request_type().as_str()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Handler URL Map
// ============================================================================

/// Resolved mapping from request type to handler URL.
///
/// # Invariants
/// - Contains a non-empty `base` entry.
/// - Every key is a known [`RequestType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct HandlerUrlMap {
    /// Handler URLs keyed by request type; always includes `base`.
    handlers: BTreeMap<RequestType, String>,
}

impl HandlerUrlMap {
    /// Builds a handler map from ordered `(request type, url)` entries.
    ///
    /// Keys are matched case-insensitively. When `base` is missing or blank
    /// it defaults to the first entry's URL with everything from the first
    /// `?` removed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingHandlers`] when `entries` is empty
    /// and [`ConfigurationError::UnknownRequestType`] for unrecognized keys.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut handlers = BTreeMap::new();
        let mut first_url: Option<String> = None;
        for (key, url) in entries {
            let request_type: RequestType = key.as_ref().parse()?;
            let url = url.into();
            if first_url.is_none() {
                first_url = Some(url.clone());
            }
            handlers.insert(request_type, url);
        }
        let Some(first_url) = first_url else {
            return Err(ConfigurationError::MissingHandlers);
        };
        let base_missing =
            handlers.get(&RequestType::Base).is_none_or(|url| url.trim().is_empty());
        if base_missing {
            handlers.insert(RequestType::Base, strip_query(&first_url).to_string());
        }
        Ok(Self {
            handlers,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base(&self) -> &str {
        self.handlers.get(&RequestType::Base).map_or("", String::as_str)
    }

    /// Returns the explicitly configured URL for a request type, if any.
    #[must_use]
    pub fn explicit(&self, request_type: RequestType) -> Option<&str> {
        self.handlers.get(&request_type).map(String::as_str).filter(|url| !url.is_empty())
    }

    /// Resolves the redirect URL for a request type.
    #[must_use]
    pub fn resolve(&self, request_type: RequestType) -> String {
        self.explicit(request_type).map_or_else(
            || format!("{}?{LTI_REQUEST_PARAM}={}", self.base(), request_type.as_str()),
            str::to_string,
        )
    }

    /// Iterates over explicit handler entries in request-type order.
    pub fn iter(&self) -> impl Iterator<Item = (RequestType, &str)> {
        self.handlers.iter().map(|(request_type, url)| (*request_type, url.as_str()))
    }
}

impl TryFrom<BTreeMap<String, String>> for HandlerUrlMap {
    type Error = ConfigurationError;

    fn try_from(value: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_entries(value)
    }
}

impl From<HandlerUrlMap> for BTreeMap<String, String> {
    fn from(value: HandlerUrlMap) -> Self {
        value
            .handlers
            .into_iter()
            .map(|(request_type, url)| (request_type.as_str().to_string(), url))
            .collect()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the URL up to (not including) the first `?`.
fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(head, _)| head)
}
