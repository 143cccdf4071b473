// crates/lti-toolbox-core/src/core/metadata.rs
// ============================================================================
// Module: LTI Tool Metadata
// Description: Typed tool metadata and its persisted key catalogue.
// Purpose: Keep stringly-typed keys at the persistence boundary only.
// Dependencies: serde, crate::core::{errors, handlers, identifiers}
// ============================================================================

//! ## Overview
//! Tool metadata is persisted as a namespaced key/value map. The only place
//! the persisted key strings appear is [`MetadataKey::as_str`]; callers work
//! with [`ToolMetadata`] and the typed values it carries.
//!
//! Security posture: the Canvas token is a secret. It is persisted (the
//! loader needs it on later requests) but never written to the tool log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::core::errors::ConfigurationError;
use crate::core::handlers::HandlerUrlMap;
use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Metadata Keys
// ============================================================================

/// Persisted metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
    /// Tool identifier.
    ToolId,
    /// Human-readable tool name.
    ToolName,
    /// Absolute path of the configuration description.
    ConfigFile,
    /// Optional tool description.
    Description,
    /// Optional icon URL.
    IconUrl,
    /// Launch privacy level.
    LaunchPrivacy,
    /// Optional tool domain.
    Domain,
    /// Launch (authenticate) URL.
    LaunchUrl,
    /// Placement option blocks.
    Placements,
    /// Absolute log file path.
    Log,
    /// Handler URL map.
    HandlerUrls,
    /// Canvas API credentials.
    CanvasApi,
}

impl MetadataKey {
    /// Every metadata key in catalogue order.
    pub const ALL: [Self; 12] = [
        Self::ToolId,
        Self::ToolName,
        Self::ConfigFile,
        Self::Description,
        Self::IconUrl,
        Self::LaunchPrivacy,
        Self::Domain,
        Self::LaunchUrl,
        Self::Placements,
        Self::Log,
        Self::HandlerUrls,
        Self::CanvasApi,
    ];

    /// Returns the persisted key string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToolId => "TOOL_ID",
            Self::ToolName => "TOOL_NAME",
            Self::ConfigFile => "TOOL_CONFIG_FILE",
            Self::Description => "TOOL_DESCRIPTION",
            Self::IconUrl => "TOOL_ICON_URL",
            Self::LaunchPrivacy => "TOOL_LAUNCH_PRIVACY",
            Self::Domain => "TOOL_DOMAIN",
            Self::LaunchUrl => "TOOL_LAUNCH_URL",
            Self::Placements => "TOOL_PLACEMENTS",
            Self::Log => "TOOL_LOG",
            Self::HandlerUrls => "TOOL_HANDLER_URLS",
            Self::CanvasApi => "TOOL_CANVAS_API",
        }
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Launch Privacy
// ============================================================================

/// Level of personal information the LMS discloses during launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchPrivacy {
    /// Name, email, and other profile data.
    #[default]
    Public,
    /// Name only.
    NameOnly,
    /// No personal information.
    Anonymous,
}

impl LaunchPrivacy {
    /// Returns the cartridge token for the privacy level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::NameOnly => "name_only",
            Self::Anonymous => "anonymous",
        }
    }
}

impl fmt::Display for LaunchPrivacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchPrivacy {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(Self::Public),
            "name_only" => Ok(Self::NameOnly),
            "anonymous" => Ok(Self::Anonymous),
            other => Err(ConfigurationError::InvalidPrivacyLevel(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Placements
// ============================================================================

/// LMS extension points a tool link can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Rich content editor button.
    Editor,
    /// Module link selection.
    LinkSelection,
    /// Assignment submission.
    HomeworkSubmission,
    /// Course navigation menu.
    CourseNavigation,
    /// Account navigation menu.
    AccountNavigation,
    /// User navigation menu.
    UserNavigation,
}

impl Placement {
    /// Returns the cartridge option name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Editor => "editor",
            Self::LinkSelection => "link_selection",
            Self::HomeworkSubmission => "homework_submission",
            Self::CourseNavigation => "course_navigation",
            Self::AccountNavigation => "account_navigation",
            Self::UserNavigation => "user_navigation",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "editor" => Ok(Self::Editor),
            "link_selection" => Ok(Self::LinkSelection),
            "homework_submission" => Ok(Self::HomeworkSubmission),
            "course_navigation" => Ok(Self::CourseNavigation),
            "account_navigation" => Ok(Self::AccountNavigation),
            "user_navigation" => Ok(Self::UserNavigation),
            other => Err(ConfigurationError::InvalidOption(other.to_string())),
        }
    }
}

/// One configured placement block as cached in `TOOL_PLACEMENTS`.
///
/// The option name stays a raw string so an unrecognized name reaches the
/// generator and fails there with [`ConfigurationError::InvalidOption`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Option name (one of the [`Placement`] tokens when valid).
    pub option: String,
    /// Per-option properties; `text` and `url` override the defaults.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Canvas Credentials
// ============================================================================

/// Canvas REST API credentials.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanvasCredentials {
    /// Canvas instance URL, without the `/api/v1` suffix.
    #[serde(default)]
    pub url: String,
    /// Bearer token.
    #[serde(default)]
    pub token: String,
}

impl CanvasCredentials {
    /// Creates credentials from a URL and token.
    #[must_use]
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// Returns true when both fields are blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.url.trim().is_empty() && self.token.trim().is_empty()
    }

    /// Returns the API base URL, `<url>/api/v1`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidCanvasCredentials`] when the URL
    /// or token is blank.
    pub fn api_base(&self) -> Result<String, ConfigurationError> {
        if self.url.trim().is_empty() {
            return Err(ConfigurationError::InvalidCanvasCredentials("url is empty".to_string()));
        }
        if self.token.trim().is_empty() {
            return Err(ConfigurationError::InvalidCanvasCredentials(
                "token is empty".to_string(),
            ));
        }
        Ok(format!("{}/api/v1", self.url.trim_end_matches('/')))
    }
}

impl fmt::Debug for CanvasCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasCredentials")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Tool Metadata
// ============================================================================

/// Typed view of a tool's cached metadata.
///
/// # Invariants
/// - A tool is dispatchable only when `id`, `launch_url`, and
///   `handler_urls` are all present (see [`ToolMetadata::is_dispatchable`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool identifier.
    pub id: Option<ToolId>,
    /// Human-readable name.
    pub name: Option<String>,
    /// Absolute path of the configuration description.
    pub config_file: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Optional icon URL.
    pub icon_url: Option<String>,
    /// Raw launch privacy token.
    pub launch_privacy: Option<String>,
    /// Optional tool domain.
    pub domain: Option<String>,
    /// Launch (authenticate) URL.
    pub launch_url: Option<String>,
    /// Configured placement blocks.
    #[serde(default)]
    pub placements: Vec<PlacementConfig>,
    /// Absolute log file path.
    pub log: Option<String>,
    /// Handler URL map.
    pub handler_urls: Option<HandlerUrlMap>,
    /// Canvas API credentials.
    pub canvas: Option<CanvasCredentials>,
}

impl ToolMetadata {
    /// Returns true when launches can be dispatched against this metadata.
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_empty())
            && self.launch_url.as_ref().is_some_and(|url| !url.is_empty())
            && self.handler_urls.is_some()
    }
}
