// crates/lti-toolbox-core/src/core/mod.rs
// ============================================================================
// Module: LTI Toolbox Core Types
// Description: Domain model for tool metadata, handlers, and LTI launches.
// Purpose: Group the serializable core types behind one module.
// Dependencies: serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! Core types are plain data with validation at construction boundaries.
//! Persistence-facing string keys live only in [`metadata::MetadataKey`];
//! everything else is strongly typed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod errors;
pub mod handlers;
pub mod hashing;
pub mod identifiers;
pub mod launch;
pub mod metadata;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use errors::ConfigurationError;
pub use handlers::HandlerUrlMap;
pub use handlers::LTI_REQUEST_PARAM;
pub use handlers::MessageType;
pub use handlers::RequestType;
pub use identifiers::ConsumerKey;
pub use identifiers::ResourceLinkId;
pub use identifiers::ToolId;
pub use identifiers::UserId;
pub use launch::CANVAS_SETTINGS_PREFIX;
pub use launch::CanvasSettings;
pub use launch::CanvasUser;
pub use launch::LTI_MESSAGE_TYPE_PARAM;
pub use launch::LaunchRequest;
pub use launch::LtiUser;
pub use launch::Permission;
pub use launch::ResourceLink;
pub use launch::Role;
pub use launch::ToolConsumer;
pub use metadata::CanvasCredentials;
pub use metadata::LaunchPrivacy;
pub use metadata::MetadataKey;
pub use metadata::Placement;
pub use metadata::PlacementConfig;
pub use metadata::ToolMetadata;
