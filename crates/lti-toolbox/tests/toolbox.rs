// crates/lti-toolbox/tests/toolbox.rs
// ============================================================================
// Module: Toolbox Tests
// Description: End-to-end toolbox behavior over the SQLite backend.
// Purpose: Ensure the request-scoped context wires every component together.
// Dependencies: lti-toolbox, lti-toolbox-core, serde_json, tempfile
// ============================================================================

//! ## Overview
//! Opens toolboxes from configuration files in temporary directories, so
//! metadata and consumers persist in a real SQLite file between opens.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use lti_toolbox::PersistedReference;
use lti_toolbox::Toolbox;
use lti_toolbox::ToolboxBuilder;
use lti_toolbox::ToolboxError;
use lti_toolbox_core::ApiError;
use lti_toolbox_core::AuthError;
use lti_toolbox_core::CanvasUser;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::HttpMethod;
use lti_toolbox_core::LaunchRequest;
use lti_toolbox_core::LaunchValidator;
use lti_toolbox_core::LmsApi;
use lti_toolbox_core::LtiUser;
use lti_toolbox_core::ResourceLink;
use lti_toolbox_core::ResourceLinkId;
use lti_toolbox_core::ToolConsumer;
use lti_toolbox_core::UserId;
use lti_toolbox_core::ValidatedLaunch;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

const CONFIG: &str = r#"
[tool]
id = "grade-sync"
name = "Grade Sync"
authenticate = "launch.php"
log = "tool.log"

[tool.handlers]
launch = "app.php"

[canvas]
url = "https://canvas.example.edu"
token = "token-123"

[web]
base-url = "https://tools.example.edu/grades/"
"#;

fn write_config(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();
    path
}

/// LMS API answering course and role lookups, recording each call.
#[derive(Default)]
struct RecordingApi {
    calls: Mutex<Vec<String>>,
}

impl RecordingApi {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl LmsApi for RecordingApi {
    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        _headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(format!("{} {path}", method.as_str()));
        match path {
            "courses/42" => Ok(json!({"id": 42, "account_id": 1})),
            "accounts/1/roles" => {
                assert_eq!(params, [("show_inherited".to_string(), "true".to_string())]);
                Ok(json!([
                    {"id": 10, "label": "Teacher"},
                    {"id": "11", "label": "Designer"},
                    {"label": "No id"}
                ]))
            }
            _ => Err(ApiError::Status {
                status: 404,
                body: None,
            }),
        }
    }
}

/// Validator accepting every launch as a learner.
struct AcceptAll;

impl LaunchValidator for AcceptAll {
    fn validate_launch(&self, _request: &LaunchRequest) -> Result<ValidatedLaunch, AuthError> {
        let key = ConsumerKey::new("consumer-1");
        Ok(ValidatedLaunch {
            consumer: ToolConsumer {
                key: key.clone(),
                name: "Example Consumer".to_string(),
                secret: "secret".to_string(),
                enabled: true,
                created_at_ms: 0,
            },
            user: LtiUser::new(UserId::new("user-9"), key.clone(), ["Learner"]),
            resource_link: ResourceLink {
                id: ResourceLinkId::new("link-1"),
                consumer_key: key,
                settings: BTreeMap::new(),
            },
        })
    }
}

fn canvas_user(settings: &[(&str, &str)]) -> CanvasUser {
    let settings: BTreeMap<String, String> = settings
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect();
    let key = ConsumerKey::new("consumer-1");
    CanvasUser::from_launch(LtiUser::new(UserId::new("user-9"), key, ["Instructor"]), &settings)
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

#[test]
fn open_caches_metadata_across_requests() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp);

    let first = Toolbox::from_configuration(&path, false).unwrap();
    assert_eq!(first.tool_id().as_str(), "grade-sync");
    assert_eq!(first.load_report().refreshed.len(), 4);
    let metadata = first.metadata().unwrap();
    assert!(metadata.is_dispatchable());
    assert_eq!(metadata.launch_url.as_deref(), Some("https://tools.example.edu/grades/launch.php"));
    assert_eq!(first.handlers().base(), "https://tools.example.edu/grades/app.php");
    assert!(temp.path().join("lti-toolbox.db").exists());
    assert!(temp.path().join("tool.log").exists());
    drop(first);

    let second = Toolbox::from_configuration(&path, false).unwrap();
    assert!(second.load_report().refreshed.is_empty());
    assert!(second.log().is_live());

    let forced = Toolbox::from_configuration(&path, true).unwrap();
    assert_eq!(forced.load_report().refreshed.len(), 4);
}

#[test]
fn persisted_reference_rebuilds_the_toolbox() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp);
    let toolbox = Toolbox::from_configuration(&path, false).unwrap();

    let reference = toolbox.persisted_reference().unwrap();
    assert_eq!(reference.config, fs::canonicalize(&path).unwrap());
    let encoded = serde_json::to_string(&reference).unwrap();
    let decoded: PersistedReference = serde_json::from_str(&encoded).unwrap();

    let rebuilt = Toolbox::from_persisted_reference(&decoded).unwrap();
    assert_eq!(rebuilt.tool_id(), toolbox.tool_id());
    assert!(rebuilt.load_report().refreshed.is_empty());
}

#[test]
fn missing_configuration_is_a_parse_failure() {
    let temp = TempDir::new().unwrap();
    let err = Toolbox::from_configuration(&temp.path().join("absent.toml"), false).unwrap_err();
    assert!(matches!(
        err,
        ToolboxError::Configuration(lti_toolbox_core::ConfigurationError::ParseFailure(_))
    ));
}

// ============================================================================
// SECTION: Operations
// ============================================================================

#[test]
fn dispatcher_authenticates_launches() {
    let temp = TempDir::new().unwrap();
    let toolbox = Toolbox::from_configuration(&write_config(&temp), false).unwrap();
    let request = LaunchRequest::from_pairs([("lti_message_type", "basic-lti-launch-request")]);
    assert!(Toolbox::is_launching(&request));

    let validator = AcceptAll;
    let mut dispatcher = toolbox.dispatcher(&validator).unwrap();
    let context = dispatcher.authenticate(&request).unwrap();
    assert_eq!(context.redirect, "https://tools.example.edu/grades/app.php?lti-request=launch");
    assert!(context.session.is_student);
}

#[test]
fn consumers_persist_and_are_queryable() {
    let temp = TempDir::new().unwrap();
    let path = write_config(&temp);
    {
        let toolbox = Toolbox::from_configuration(&path, false).unwrap();
        assert!(toolbox.create_consumer("Example Consumer", None, None).unwrap());
    }
    let toolbox = Toolbox::from_configuration(&path, false).unwrap();
    assert!(!toolbox.create_consumer("Example Consumer", None, None).unwrap());
    assert_eq!(toolbox.list_consumers().unwrap().len(), 1);

    let rows = toolbox.query("SELECT name FROM lti_consumer").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&json!("Example Consumer")));
}

#[test]
fn configuration_xml_reflects_cached_metadata() {
    let temp = TempDir::new().unwrap();
    let toolbox = Toolbox::from_configuration(&write_config(&temp), false).unwrap();
    let xml = toolbox.configuration_xml().unwrap();
    assert!(xml.contains("<blti:title>Grade Sync</blti:title>"));
    assert!(xml.contains("<lticm:property name=\"tool_id\">grade-sync</lticm:property>"));
    assert!(xml.contains("<lticm:property name=\"privacy_level\">public</lticm:property>"));
    assert!(xml.contains("<lticm:options name=\"course_navigation\">"));
}

// ============================================================================
// SECTION: LMS API
// ============================================================================

#[test]
fn api_client_is_built_once_from_cached_credentials() {
    let temp = TempDir::new().unwrap();
    let toolbox = Toolbox::from_configuration(&write_config(&temp), false).unwrap();
    let first = toolbox.api().unwrap();
    let second = toolbox.api().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn canvas_roles_are_looked_up_once_per_ttl() {
    let temp = TempDir::new().unwrap();
    let api = Arc::new(RecordingApi::default());
    let toolbox = ToolboxBuilder::new(write_config(&temp))
        .lms_api(Arc::clone(&api) as Arc<dyn LmsApi>)
        .open()
        .unwrap();
    let user = canvas_user(&[("custom_canvas_course_id", "42")]);

    let roles = toolbox.canvas_roles(&user).unwrap();
    assert_eq!(roles.keys().cloned().collect::<Vec<_>>(), vec!["10".to_string(), "11".to_string()]);
    assert_eq!(roles["10"]["label"], json!("Teacher"));
    assert_eq!(api.calls(), vec!["GET courses/42", "GET accounts/1/roles"]);

    let again = toolbox.canvas_roles(&user).unwrap();
    assert_eq!(again, roles);
    assert_eq!(api.calls(), vec!["GET courses/42", "GET accounts/1/roles", "GET courses/42"]);

    let direct = canvas_user(&[("custom_canvas_account_id", "1")]);
    assert_eq!(toolbox.canvas_roles(&direct).unwrap(), roles);
    assert_eq!(api.calls().len(), 3);
}

#[test]
fn canvas_roles_need_an_account_or_course() {
    let temp = TempDir::new().unwrap();
    let api = Arc::new(RecordingApi::default());
    let toolbox = ToolboxBuilder::new(write_config(&temp))
        .lms_api(Arc::clone(&api) as Arc<dyn LmsApi>)
        .open()
        .unwrap();

    let err = toolbox.canvas_roles(&canvas_user(&[])).unwrap_err();
    assert!(matches!(err, ToolboxError::MissingInformation(_)));
    assert!(api.calls().is_empty());

    let err = toolbox.canvas_roles(&canvas_user(&[("custom_canvas_course_id", "7")])).unwrap_err();
    assert!(matches!(err, ToolboxError::Api(ApiError::Status { status: 404, .. })));
}
