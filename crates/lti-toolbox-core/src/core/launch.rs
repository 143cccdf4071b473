// crates/lti-toolbox-core/src/core/launch.rs
// ============================================================================
// Module: LTI Launch Model
// Description: Launch requests, consumers, users, resource links, and roles.
// Purpose: Provide the request-scoped data a dispatcher works on.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! A [`LaunchRequest`] is the raw parameter bag of an inbound request. After
//! validation the collaborator yields a [`ToolConsumer`], an [`LtiUser`], and
//! a [`ResourceLink`]; the dispatcher normalizes the user into a
//! [`CanvasUser`] carrying prefix-stripped Canvas settings.
//!
//! Roles follow LTI 1.x conventions: short role names are expanded to
//! `urn:lti:role:ims/lis/<Role>` before matching.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ConsumerKey;
use crate::core::identifiers::ResourceLinkId;
use crate::core::identifiers::UserId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Request parameter carrying the LTI message-type marker.
pub const LTI_MESSAGE_TYPE_PARAM: &str = "lti_message_type";

/// Prefix of Canvas-specific custom launch settings.
pub const CANVAS_SETTINGS_PREFIX: &str = "custom_canvas_";

/// Prefix applied to short LIS role names.
const LIS_ROLE_PREFIX: &str = "urn:lti:role:ims/lis/";

/// Role URNs that mark an administrator.
const ADMIN_ROLES: [&str; 4] = [
    "urn:lti:role:ims/lis/Administrator",
    "urn:lti:sysrole:ims/lis/SysAdmin",
    "urn:lti:sysrole:ims/lis/Administrator",
    "urn:lti:instrole:ims/lis/Administrator",
];

/// Role URNs that mark teaching staff.
const STAFF_ROLES: [&str; 3] = [
    "urn:lti:role:ims/lis/Instructor",
    "urn:lti:role:ims/lis/ContentDeveloper",
    "urn:lti:role:ims/lis/TeachingAssistant",
];

/// Role URN that marks a learner.
const LEARNER_ROLE: &str = "urn:lti:role:ims/lis/Learner";

// ============================================================================
// SECTION: Launch Request
// ============================================================================

/// Inbound request parameters and transport context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Request parameters (POST body merged over query string).
    params: BTreeMap<String, String>,
    /// HTTP referrer, when supplied.
    referrer: Option<String>,
}

impl LaunchRequest {
    /// Creates a request from a parameter map.
    #[must_use]
    pub const fn new(params: BTreeMap<String, String>) -> Self {
        Self {
            params,
            referrer: None,
        }
    }

    /// Creates a request from `(name, value)` pairs; later pairs win.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }

    /// Attaches the HTTP referrer.
    #[must_use]
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns all parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns the HTTP referrer.
    #[must_use]
    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    /// Returns the non-empty `lti_message_type` marker.
    #[must_use]
    pub fn message_type_marker(&self) -> Option<&str> {
        self.param(LTI_MESSAGE_TYPE_PARAM).filter(|marker| !marker.trim().is_empty())
    }

    /// Returns true when the request carries an LTI message-type marker.
    #[must_use]
    pub fn is_launching(&self) -> bool {
        self.message_type_marker().is_some()
    }
}

// ============================================================================
// SECTION: Tool Consumer
// ============================================================================

/// Trust record for an LMS instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConsumer {
    /// Consumer key (OAuth consumer key).
    pub key: ConsumerKey,
    /// Human name, unique within a tool.
    pub name: String,
    /// Shared secret.
    pub secret: String,
    /// Whether launches from this consumer are accepted.
    pub enabled: bool,
    /// Creation time in unix milliseconds.
    pub created_at_ms: i64,
}

impl fmt::Debug for ToolConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolConsumer")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .field("enabled", &self.enabled)
            .field("created_at_ms", &self.created_at_ms)
            .finish()
    }
}

// ============================================================================
// SECTION: Resource Link
// ============================================================================

/// Placement instance a launch originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Resource link identifier.
    pub id: ResourceLinkId,
    /// Consumer that owns the link.
    pub consumer_key: ConsumerKey,
    /// Launch settings (custom parameters) recorded for the link.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: LTI User
// ============================================================================

/// User asserted by a validated launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtiUser {
    /// LMS user identifier.
    pub id: UserId,
    /// Consumer that asserted the user.
    pub consumer_key: ConsumerKey,
    /// Fully qualified role URNs.
    roles: Vec<String>,
    /// Display name, when disclosed.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Email address, when disclosed.
    #[serde(default)]
    pub email: Option<String>,
}

impl LtiUser {
    /// Creates a user, expanding short role names to LIS URNs.
    #[must_use]
    pub fn new<I, S>(id: UserId, consumer_key: ConsumerKey, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = roles
            .into_iter()
            .map(|role| expand_role(role.as_ref()))
            .filter(|role| !role.is_empty())
            .collect();
        Self {
            id,
            consumer_key,
            roles,
            full_name: None,
            email: None,
        }
    }

    /// Parses the comma-separated `roles` launch parameter.
    #[must_use]
    pub fn parse_roles(value: &str) -> Vec<String> {
        value.split(',').map(expand_role).filter(|role| !role.is_empty()).collect()
    }

    /// Returns the fully qualified role URNs.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Returns true when the user holds `role` (short name or URN).
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        let wanted = expand_role(role);
        self.roles.iter().any(|held| *held == wanted)
    }

    /// Returns true for system, institution, or context administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.iter().any(|role| self.has_role(role))
    }

    /// Returns true for instructors, content developers, and teaching assistants.
    #[must_use]
    pub fn is_staff(&self) -> bool {
        STAFF_ROLES.iter().any(|role| self.has_role(role))
    }

    /// Returns true for learners.
    #[must_use]
    pub fn is_learner(&self) -> bool {
        self.has_role(LEARNER_ROLE)
    }
}

/// Expands a short LIS role name to its URN form.
fn expand_role(role: &str) -> String {
    let role = role.trim();
    if role.is_empty() || role.starts_with("urn:") {
        role.to_string()
    } else {
        format!("{LIS_ROLE_PREFIX}{role}")
    }
}

// ============================================================================
// SECTION: Canvas User
// ============================================================================

/// Canvas custom settings with the `custom_canvas_` prefix stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanvasSettings(BTreeMap<String, String>);

impl CanvasSettings {
    /// Extracts `custom_canvas_*` entries, dropping the prefix.
    ///
    /// Entries without the prefix and entries whose stripped name is empty
    /// are not retained.
    #[must_use]
    pub fn from_settings(settings: &BTreeMap<String, String>) -> Self {
        Self(
            settings
                .iter()
                .filter_map(|(key, value)| {
                    key.strip_prefix(CANVAS_SETTINGS_PREFIX)
                        .filter(|name| !name.is_empty())
                        .map(|name| (name.to_string(), value.clone()))
                })
                .collect(),
        )
    }

    /// Returns a stripped setting.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns all stripped settings.
    #[must_use]
    pub const fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Normalized user: the launch user plus Canvas settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasUser {
    /// Underlying LTI user.
    pub user: LtiUser,
    /// Prefix-stripped Canvas settings.
    pub canvas: CanvasSettings,
}

impl CanvasUser {
    /// Normalizes a user against resource-link settings.
    #[must_use]
    pub fn from_launch(user: LtiUser, settings: &BTreeMap<String, String>) -> Self {
        Self {
            user,
            canvas: CanvasSettings::from_settings(settings),
        }
    }

    /// Returns the derived role.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        Role::for_user(&self.user)
    }

    /// Returns true when the derived role grants `permission`.
    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.role().is_some_and(|role| role.grants(permission))
    }
}

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Permissions a derived role can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// View tool content.
    View,
    /// Edit tool content.
    Edit,
    /// Configure the tool.
    Configure,
}

/// Tool role derived from LMS role flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Administrator.
    Admin,
    /// Teaching staff.
    Staff,
    /// Learner.
    Learner,
}

impl Role {
    /// Derives a role by priority: admin, then staff, then learner.
    ///
    /// Users holding none of the recognized roles get `None`.
    #[must_use]
    pub fn for_user(user: &LtiUser) -> Option<Self> {
        if user.is_admin() {
            Some(Self::Admin)
        } else if user.is_staff() {
            Some(Self::Staff)
        } else if user.is_learner() {
            Some(Self::Learner)
        } else {
            None
        }
    }

    /// Returns the permissions granted to the role.
    #[must_use]
    pub const fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Admin => &[Permission::Configure, Permission::Edit],
            Self::Staff => &[Permission::Edit],
            Self::Learner => &[Permission::View],
        }
    }

    /// Returns true when the role grants `permission`.
    #[must_use]
    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Returns the stable role label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
            Self::Learner => "learner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
