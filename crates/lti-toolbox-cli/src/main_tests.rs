// crates/lti-toolbox-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Argument parsing and command output of the CLI entry point.
// Purpose: Ensure administrative flows render the expected output.
// Dependencies: lti-toolbox-cli main helpers, tempfile
// ============================================================================

//! ## Overview
//! Parses argument vectors with clap and runs them against configuration
//! files in temporary directories.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use clap::Parser;
use serde_json::Value;
use tempfile::TempDir;

use super::Cli;
use super::Commands;
use super::ConsumerCommand;
use super::execute;
use super::redact_token;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const CONFIG: &str = r#"
[tool]
id = "grade-sync"
name = "Grade Sync"
authenticate = "launch.php"

[tool.handlers]
launch = "app.php"

[canvas]
url = "https://canvas.example.edu"
token = "token-123"

[web]
base-url = "https://tools.example.edu/grades/"
"#;

fn write_config(dir: &Path) -> String {
    let path = dir.join("config.toml");
    fs::write(&path, CONFIG).unwrap();
    path.display().to_string()
}

fn run(args: &[&str]) -> Result<String, String> {
    let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
    execute(&cli).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn parses_consumer_create_options() {
    let cli = Cli::try_parse_from([
        "lti-toolbox",
        "--config",
        "tool.toml",
        "consumer",
        "create",
        "Example Consumer",
        "--key",
        "k",
    ])
    .unwrap();
    assert_eq!(cli.config.to_str(), Some("tool.toml"));
    let Commands::Consumer {
        command: ConsumerCommand::Create(create),
    } = cli.command
    else {
        panic!("expected consumer create");
    };
    assert_eq!(create.name, "Example Consumer");
    assert_eq!(create.key.as_deref(), Some("k"));
    assert_eq!(create.secret, None);
}

#[test]
fn rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["lti-toolbox", "serve"]).is_err());
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[test]
fn metadata_hides_canvas_token() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let output = run(&["lti-toolbox", "--config", config.as_str(), "metadata"]).unwrap();
    let metadata: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(metadata["id"], "grade-sync");
    assert_eq!(metadata["canvas"]["token"], "<redacted>");
    assert!(!output.contains("token-123"));
}

#[test]
fn reset_reports_every_group() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    run(&["lti-toolbox", "--config", config.as_str(), "metadata"]).unwrap();
    let output = run(&["lti-toolbox", "--config", config.as_str(), "reset"]).unwrap();
    let report: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(
        report["refreshed"],
        serde_json::json!(["identity", "log", "handlers", "canvas_api"])
    );
}

#[test]
fn consumer_create_then_list() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let create =
        ["lti-toolbox", "--config", config.as_str(), "consumer", "create", "Example Consumer"];
    let created = run(&create).unwrap();
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["name"], "Example Consumer");
    assert_eq!(created["secret"].as_str().map(str::len), Some(64));

    let err = run(&create).unwrap_err();
    assert_eq!(err, "consumer 'Example Consumer' already exists");

    let listed = run(&["lti-toolbox", "--config", config.as_str(), "consumer", "list"]).unwrap();
    let listed: Value = serde_json::from_str(&listed).unwrap();
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["key"], created["key"]);
    assert!(listed[0].get("secret").is_none());
}

#[test]
fn xml_prints_cartridge() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let output = run(&["lti-toolbox", "--config", config.as_str(), "xml"]).unwrap();
    assert!(output.starts_with("<?xml"));
    assert!(output.ends_with("</cartridge_basiclti_link>"));
}

#[test]
fn missing_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let absent = temp.path().join("absent.toml").display().to_string();
    let err = run(&["lti-toolbox", "--config", absent.as_str(), "xml"]).unwrap_err();
    assert!(err.starts_with("configuration error"));
}

#[test]
fn redaction_skips_absent_credentials() {
    let mut metadata = serde_json::json!({"id": "grade-sync", "canvas": null});
    redact_token(&mut metadata);
    assert_eq!(metadata["canvas"], Value::Null);
}
