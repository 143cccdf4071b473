// crates/lti-toolbox-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Tests for description parsing, ordering, and hard limits.
// Purpose: Ensure descriptions parse strictly and fail closed.
// Dependencies: lti-toolbox-config, tempfile
// ============================================================================

//! ## Overview
//! Exercises the TOML description loader: ordered handlers and placements,
//! defaults, unknown-key rejection, and size/encoding limits.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use lti_toolbox_config::ConfigError;
use lti_toolbox_config::DEFAULT_STORAGE_PATH;
use lti_toolbox_config::ToolboxConfig;
use lti_toolbox_core::ConfigurationError;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const FULL_CONFIG: &str = r#"
[tool]
name = "Grade Sync"
description = "Sync grades"
icon = "icon.png"
launch-privacy = "name_only"
authenticate = "lti/launch.php"
log = "logs/tool.log"

[tool.handlers]
launch = "app/launch.php?mode=student"
dashboard = "app/dashboard.php"
base = "app/"

[tool.placements.user_navigation]
text = "Grades"

[tool.placements.course_navigation]
url = "app/course.php"

[storage]
path = "db/toolbox.db"
busy-timeout-ms = 2000
journal-mode = "delete"

[canvas]
url = "https://canvas.example.edu"
token = "secret-token"

[web]
base-url = "https://tools.example.edu/grades/"

[cache]
ttl-seconds = 60
"#;

fn write_config(dir: &Path, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join("lti-toolbox.toml");
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn full_description_parses_in_document_order() {
    let config = ToolboxConfig::parse(FULL_CONFIG).unwrap();
    let keys: Vec<&str> = config.tool.handlers.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["launch", "dashboard", "base"]);
    let options: Vec<&str> =
        config.tool.placements.iter().map(|placement| placement.option.as_str()).collect();
    assert_eq!(options, vec!["user_navigation", "course_navigation"]);
    assert_eq!(config.tool.launch_privacy.as_deref(), Some("name_only"));
    assert_eq!(config.storage.busy_timeout_ms, 2000);
    assert_eq!(config.cache.ttl(), Duration::from_secs(60));
    let credentials = config.canvas.as_ref().unwrap().credentials();
    assert_eq!(credentials.api_base().unwrap(), "https://canvas.example.edu/api/v1");
    assert_eq!(config.web.base_url.as_deref(), Some("https://tools.example.edu/grades/"));
}

#[test]
fn minimal_description_uses_defaults() {
    let config = ToolboxConfig::parse("[tool.handlers]\nlaunch = \"a.php\"\n").unwrap();
    assert_eq!(config.tool.explicit_id(), None);
    assert_eq!(config.storage.path, DEFAULT_STORAGE_PATH);
    assert!(config.canvas.is_none());
    assert_eq!(config.cache.ttl_seconds, 600);
}

#[test]
fn blank_explicit_id_is_treated_as_absent() {
    let config = ToolboxConfig::parse("[tool]\nid = \"  \"\n").unwrap();
    assert_eq!(config.tool.explicit_id(), None);
}

#[test]
fn unknown_top_level_key_is_rejected() {
    let err = ToolboxConfig::parse("[mysql]\nhost = \"localhost\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn unknown_tool_key_is_rejected() {
    let err = ToolboxConfig::parse("[tool]\ncolour = \"blue\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn non_string_handler_is_rejected() {
    let err = ToolboxConfig::parse("[tool.handlers]\nlaunch = 3\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn zero_cache_ttl_is_rejected() {
    let err = ToolboxConfig::parse("[cache]\nttl-seconds = 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn config_errors_map_to_parse_failure() {
    let err = ToolboxConfig::parse("not toml = = =").unwrap_err();
    assert!(matches!(ConfigurationError::from(err), ConfigurationError::ParseFailure(_)));
}

#[test]
fn canvas_token_is_redacted_in_debug() {
    let config = ToolboxConfig::parse(FULL_CONFIG).unwrap();
    let rendered = format!("{:?}", config.canvas);
    assert!(!rendered.contains("secret-token"));
}

// ============================================================================
// SECTION: Loading
// ============================================================================

#[test]
fn load_records_directory_and_contents() {
    let temp = TempDir::new().unwrap();
    let tool_dir = temp.path().join("grades");
    fs::create_dir_all(&tool_dir).unwrap();
    let path = write_config(&tool_dir, FULL_CONFIG.as_bytes());
    let loaded = ToolboxConfig::load(&path).unwrap();
    assert_eq!(loaded.directory_name(), "grades");
    assert_eq!(loaded.contents, FULL_CONFIG);
    assert!(loaded.path.is_absolute());
    let store = loaded.config.storage.store_config(&loaded.directory);
    assert!(store.path.ends_with("db/toolbox.db"));
    assert_eq!(loaded.resolve_path("/var/log/x.log"), Path::new("/var/log/x.log"));
}

#[test]
fn load_rejects_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = ToolboxConfig::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn load_rejects_oversized_file() {
    let temp = TempDir::new().unwrap();
    let mut contents = b"# padding\n".to_vec();
    contents.resize(1024 * 1024 + 1, b'#');
    let path = write_config(temp.path(), &contents);
    let err = ToolboxConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn load_rejects_non_utf8() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path(), &[0xff, 0xfe, 0x00]);
    let err = ToolboxConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
