// crates/lti-toolbox-config/src/lib.rs
// ============================================================================
// Module: LTI Toolbox Config
// Description: Configuration description model and loader.
// Purpose: Parse the per-tool TOML description with strict limits.
// Dependencies: lti-toolbox-core, lti-toolbox-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! A tool is described by a TOML file living in its own directory. Relative
//! paths inside the description (storage, log, icon, launch URL, handlers)
//! are resolved against that directory by the toolbox loader. This crate
//! only parses and validates; it never touches storage.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CacheConfig;
pub use config::CanvasConfig;
pub use config::ConfigError;
pub use config::DEFAULT_CACHE_TTL_SECONDS;
pub use config::DEFAULT_LOG_PATH;
pub use config::DEFAULT_STORAGE_PATH;
pub use config::LoadedConfig;
pub use config::StorageConfig;
pub use config::ToolConfig;
pub use config::ToolboxConfig;
pub use config::WebConfig;
