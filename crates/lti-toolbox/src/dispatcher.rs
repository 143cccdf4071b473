// crates/lti-toolbox/src/dispatcher.rs
// ============================================================================
// Module: Launch Dispatcher
// Description: Authenticates LTI launches and resolves their redirect target.
// Purpose: Drive a launch from validation through message-type dispatch.
// Dependencies: serde, uuid, lti-toolbox-core
// ============================================================================

//! ## Overview
//! A [`LaunchDispatcher`] services one inbound request:
//!
//! ```text
//! Unauthenticated -> Validating -> Authenticated(type) -> Dispatched(type)
//!                         \
//!                          -> Rejected
//! ```
//!
//! Signature, nonce, timestamp, and consumer checks belong to the
//! [`LaunchValidator`] collaborator. Once it accepts a launch, the message
//! type is classified and looked up in [`DISPATCH_TABLE`], whose handler
//! builds the [`SessionState`]. The redirect always comes from the
//! [`HandlerUrlMap`] fallback rule. Any failure is terminal: the launch is
//! rejected and the error surfaced, never downgraded to anonymous access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use lti_toolbox_core::AuthError;
use lti_toolbox_core::CanvasUser;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::HandlerUrlMap;
use lti_toolbox_core::LaunchRequest;
use lti_toolbox_core::LaunchValidator;
use lti_toolbox_core::MessageType;
use lti_toolbox_core::RequestType;
use lti_toolbox_core::ResourceLink;
use lti_toolbox_core::ResourceLinkId;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_core::ValidatedLaunch;
use serde::Serialize;
use uuid::Uuid;

use crate::log::ToolLog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User id recorded for content-item selections.
pub const CONTENT_ITEM_USER_ID: &str = "System";

/// Content-item parameter naming accepted presentation targets.
const DOCUMENT_TARGETS_PARAM: &str = "accept_presentation_document_targets";

/// Content-item return URL parameter.
const RETURN_URL_PARAM: &str = "content_item_return_url";

/// LTI version parameter.
const LTI_VERSION_PARAM: &str = "lti_version";

/// Builds session state for one message type.
type DispatchFn = fn(&ValidatedLaunch, &CanvasUser, &LaunchRequest) -> SessionState;

/// Message type to session handler table.
pub const DISPATCH_TABLE: [(MessageType, DispatchFn); 5] = [
    (MessageType::Launch, on_launch),
    (MessageType::Dashboard, redirect_only),
    (MessageType::Configure, redirect_only),
    (MessageType::ContentItem, on_content_item),
    (MessageType::Error, redirect_only),
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Launch lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message_type", rename_all = "snake_case")]
pub enum LaunchState {
    /// No launch has been attempted.
    Unauthenticated,
    /// The validator is checking the launch.
    Validating,
    /// The launch validated and its message type is known.
    Authenticated(MessageType),
    /// Session state and redirect are resolved.
    Dispatched(MessageType),
    /// Validation or classification failed.
    Rejected,
}

/// Request-scoped session state captured by a launch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Consumer the launch came from.
    pub consumer_key: Option<ConsumerKey>,
    /// Resource link of a regular launch.
    pub resource_link_id: Option<ResourceLinkId>,
    /// Placeholder resource id of a content-item selection.
    pub resource_id: Option<String>,
    /// Whether the placeholder resource has been created.
    pub resource_id_created: Option<bool>,
    /// Consumer key of the user's resource link.
    pub user_consumer_key: Option<ConsumerKey>,
    /// Launching user id.
    pub user_id: Option<String>,
    /// True when the user is a learner.
    pub is_student: bool,
    /// True for content-item selections.
    pub is_content_item: bool,
    /// LTI protocol version of a content-item request.
    pub lti_version: Option<String>,
    /// Content-item return URL.
    pub return_url: Option<String>,
    /// Posted content-item title.
    pub title: Option<String>,
    /// Posted content-item text.
    pub text: Option<String>,
    /// Posted content-item data.
    pub data: Option<String>,
    /// Accepted presentation document targets.
    pub document_targets: Vec<String>,
    /// HTTP referrer.
    pub referrer: Option<String>,
    /// Canvas settings with the `custom_canvas_` prefix stripped.
    pub canvas: BTreeMap<String, String>,
}

/// Context of an authenticated launch.
///
/// # Invariants
/// - Exists only for launches the validator accepted.
/// - `user` is always the Canvas-augmented view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchContext {
    /// Resolved consumer.
    pub consumer: ToolConsumer,
    /// Augmented user.
    pub user: CanvasUser,
    /// Resolved resource link.
    pub resource_link: ResourceLink,
    /// Classified message type.
    pub message_type: MessageType,
    /// Session state for downstream handlers.
    pub session: SessionState,
    /// Redirect target.
    pub redirect: String,
}

/// Per-request launch dispatcher.
pub struct LaunchDispatcher<'a> {
    /// Handler URLs used for redirects.
    handlers: &'a HandlerUrlMap,
    /// Signature/nonce/consumer validation collaborator.
    validator: &'a dyn LaunchValidator,
    /// Tool log.
    log: &'a ToolLog,
    /// Lifecycle state.
    state: LaunchState,
    /// Context of the last successful launch.
    context: Option<LaunchContext>,
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

impl<'a> LaunchDispatcher<'a> {
    /// Creates an unauthenticated dispatcher.
    #[must_use]
    pub fn new(
        handlers: &'a HandlerUrlMap,
        validator: &'a dyn LaunchValidator,
        log: &'a ToolLog,
    ) -> Self {
        Self {
            handlers,
            validator,
            log,
            state: LaunchState::Unauthenticated,
            context: None,
        }
    }

    /// Authenticates `request` and dispatches it by message type.
    ///
    /// # Errors
    ///
    /// Returns the validator's [`AuthError`], or
    /// [`AuthError::UnsupportedMessageType`] when the message-type marker is
    /// absent or unknown. The dispatcher is then [`LaunchState::Rejected`].
    pub fn authenticate(&mut self, request: &LaunchRequest) -> Result<&LaunchContext, AuthError> {
        self.state = LaunchState::Validating;
        self.context = None;
        match self.dispatch(request) {
            Ok(context) => {
                self.state = LaunchState::Dispatched(context.message_type);
                self.log.info(format!(
                    "LTI {} request from consumer {} dispatched to {}",
                    context.message_type, context.consumer.key, context.redirect
                ));
                Ok(&*self.context.insert(context))
            }
            Err(err) => {
                self.state = LaunchState::Rejected;
                self.log.warning(format!("LTI request rejected ({}): {err}", err.label()));
                Err(err)
            }
        }
    }

    /// Returns true when a launch validated and its user was augmented.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, LaunchState::Authenticated(_) | LaunchState::Dispatched(_))
            && self.context.is_some()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LaunchState {
        self.state
    }

    /// Returns the context of the last successful launch.
    #[must_use]
    pub const fn context(&self) -> Option<&LaunchContext> {
        self.context.as_ref()
    }

    /// Returns where the caller should redirect: the dispatched handler, or
    /// the error handler after a rejection.
    #[must_use]
    pub fn redirect_url(&self) -> Option<String> {
        match self.state {
            LaunchState::Dispatched(_) => {
                self.context.as_ref().map(|context| context.redirect.clone())
            }
            LaunchState::Rejected => Some(self.handlers.resolve(RequestType::Error)),
            LaunchState::Unauthenticated
            | LaunchState::Validating
            | LaunchState::Authenticated(_) => None,
        }
    }

    /// Validates, classifies, and runs the session handler.
    fn dispatch(&mut self, request: &LaunchRequest) -> Result<LaunchContext, AuthError> {
        let launch = self.validator.validate_launch(request)?;
        let marker = request.message_type_marker().unwrap_or_default();
        let message_type = MessageType::from_lti_message_type(marker)
            .ok_or_else(|| AuthError::UnsupportedMessageType(marker.to_string()))?;
        self.state = LaunchState::Authenticated(message_type);

        let user = CanvasUser::from_launch(launch.user.clone(), &launch.resource_link.settings);
        let handler = DISPATCH_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == message_type)
            .map_or(redirect_only as DispatchFn, |(_, handler)| *handler);
        let session = handler(&launch, &user, request);
        let redirect = self.handlers.resolve(message_type.request_type());
        Ok(LaunchContext {
            consumer: launch.consumer,
            user,
            resource_link: launch.resource_link,
            message_type,
            session,
            redirect,
        })
    }
}

/// Returns true when `request` carries an LTI message-type marker.
#[must_use]
pub fn is_launching(request: &LaunchRequest) -> bool {
    request.is_launching()
}

// ============================================================================
// SECTION: Session Handlers
// ============================================================================

/// Session state for a regular launch.
fn on_launch(launch: &ValidatedLaunch, user: &CanvasUser, request: &LaunchRequest) -> SessionState {
    SessionState {
        consumer_key: Some(launch.consumer.key.clone()),
        resource_link_id: Some(launch.resource_link.id.clone()),
        user_consumer_key: Some(user.user.consumer_key.clone()),
        user_id: Some(user.user.id.to_string()),
        is_student: user.user.is_learner(),
        is_content_item: false,
        referrer: request.referrer().map(str::to_string),
        canvas: user.canvas.as_map().clone(),
        ..SessionState::default()
    }
}

/// Session state for a content-item selection.
fn on_content_item(
    launch: &ValidatedLaunch,
    _user: &CanvasUser,
    request: &LaunchRequest,
) -> SessionState {
    let owned = |name: &str| request.param(name).map(str::to_string);
    SessionState {
        consumer_key: Some(launch.consumer.key.clone()),
        resource_id: Some(generate_guid()),
        resource_id_created: Some(false),
        user_consumer_key: Some(launch.consumer.key.clone()),
        user_id: Some(CONTENT_ITEM_USER_ID.to_string()),
        is_student: false,
        is_content_item: true,
        lti_version: owned(LTI_VERSION_PARAM),
        return_url: owned(RETURN_URL_PARAM),
        title: owned("title"),
        text: owned("text"),
        data: owned("data"),
        document_targets: request
            .param(DOCUMENT_TARGETS_PARAM)
            .map(|targets| {
                targets
                    .split(',')
                    .map(str::trim)
                    .filter(|target| !target.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        referrer: request.referrer().map(str::to_string),
        ..SessionState::default()
    }
}

/// Message types that only resolve a redirect.
fn redirect_only(
    _launch: &ValidatedLaunch,
    _user: &CanvasUser,
    _request: &LaunchRequest,
) -> SessionState {
    SessionState::default()
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Generates a random version 4 GUID.
fn generate_guid() -> String {
    Uuid::new_v4().to_string()
}
