// crates/lti-toolbox/src/lib.rs
// ============================================================================
// Module: LTI Toolbox Library
// Description: Tool Provider service layer for Canvas LTI launches.
// Purpose: Expose the toolbox context and its collaborating components.
// Dependencies: crate::{cache, canvas, dispatcher, error, generator, loader,
//               log, metadata, registry, toolbox, url}
// ============================================================================

//! ## Overview
//! The service layer turns a configuration description into a working Tool
//! Provider: it caches tool metadata per tool id, manages consumer trust
//! records, authenticates and dispatches LTI launches, renders the cartridge
//! XML an LMS installs the tool from, and talks to the Canvas REST API.
//!
//! [`Toolbox`] is the entry point; the components are public for callers
//! that wire their own collaborators.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache;
pub mod canvas;
pub mod dispatcher;
pub mod error;
pub mod generator;
pub mod loader;
pub mod log;
pub mod metadata;
pub mod registry;
pub mod toolbox;
pub mod url;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::ToolCache;
pub use canvas::CanvasClient;
pub use canvas::CanvasClientConfig;
pub use dispatcher::LaunchContext;
pub use dispatcher::LaunchDispatcher;
pub use dispatcher::LaunchState;
pub use dispatcher::SessionState;
pub use dispatcher::is_launching;
pub use error::ToolboxError;
pub use generator::Generator;
pub use loader::LoadOptions;
pub use loader::LoadReport;
pub use loader::MetadataGroup;
pub use loader::load_configuration;
pub use loader::resolve_tool_id;
pub use log::LogError;
pub use log::LogLevel;
pub use log::LogRecord;
pub use log::ToolLog;
pub use metadata::MetadataStore;
pub use registry::ConsumerRegistry;
pub use toolbox::PersistedReference;
pub use toolbox::Toolbox;
pub use toolbox::ToolboxBackend;
pub use toolbox::ToolboxBuilder;
pub use url::UrlResolver;
