// crates/lti-toolbox/tests/config_xml.rs
// ============================================================================
// Module: Configuration XML Tests
// Description: Cartridge rendering, validation, and placement options.
// Purpose: Ensure the generated document is what Canvas installs from.
// Dependencies: lti-toolbox, lti-toolbox-core, proptest
// ============================================================================

//! ## Overview
//! Checks the rendered cartridge document and the generator's validation.

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

use std::collections::BTreeMap;

use lti_toolbox::Generator;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::PlacementConfig;
use lti_toolbox_core::ToolId;
use lti_toolbox_core::ToolMetadata;
use proptest::prelude::*;

const LAUNCH_URL: &str = "https://tools.example.edu/grades/launch.php";

fn generator() -> Generator {
    Generator::new("Grade Sync", "grades_1234", LAUNCH_URL).unwrap()
}

#[test]
fn default_document_has_one_course_navigation_block() {
    let xml = generator().save_xml();
    let expected = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<cartridge_basiclti_link xmlns=\"http://www.imsglobal.org/xsd/imslticc_v1p0\" \
xmlns:blti=\"http://www.imsglobal.org/xsd/imsbasiclti_v1p0\" \
xmlns:lticm=\"http://www.imsglobal.org/xsd/imslticm_v1p0\" \
xmlns:lticp=\"http://www.imsglobal.org/xsd/imslticp_v1p0\" \
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
xsi:schemaLocation=\"http://www.imsglobal.org/xsd/imslticc_v1p0 \
http://www.imsglobal.org/xsd/imslticc_v1p0.xsd \
http://www.imsglobal.org/xsd/imsbasiclti_v1p0 http://www.imsglobal.org/xsd/imsbasiclti_v1p0.xsd \
http://www.imsglobal.org/xsd/imslticm_v1p0 http://www.imsglobal.org/xsd/imslticm_v1p0.xsd \
http://www.imsglobal.org/xsd/imslticp_v1p0 http://www.imsglobal.org/xsd/imslticp_v1p0.xsd\">
  <blti:title>Grade Sync</blti:title>
  <blti:launch_url>https://tools.example.edu/grades/launch.php</blti:launch_url>
  <blti:extensions platform=\"canvas.instructure.com\">
    <lticm:property name=\"tool_id\">grades_1234</lticm:property>
    <lticm:property name=\"privacy_level\">anonymous</lticm:property>
    <lticm:options name=\"course_navigation\">
      <lticm:property name=\"text\">Grade Sync</lticm:property>
      <lticm:property name=\"url\">https://tools.example.edu/grades/launch.php</lticm:property>
    </lticm:options>
  </blti:extensions>
  <cartridge_bundle identifierref=\"BLT001_Bundle\"/>
  <cartridge_icon identifierref=\"BLT001_Icon\"/>
</cartridge_basiclti_link>
";
    assert_eq!(xml, expected);
}

#[test]
fn optional_fields_render_when_set() {
    let xml = generator()
        .with_description("Sync grades")
        .with_icon_url("https://tools.example.edu/grades/icon.png")
        .with_domain("tools.example.edu")
        .with_launch_privacy("name_only")
        .unwrap()
        .save_xml();
    assert!(xml.contains("  <blti:description>Sync grades</blti:description>\n"));
    assert!(xml.contains("  <blti:icon>https://tools.example.edu/grades/icon.png</blti:icon>\n"));
    assert!(xml.contains("<lticm:property name=\"privacy_level\">name_only</lticm:property>"));
    assert!(xml.contains("<lticm:property name=\"domain\">tools.example.edu</lticm:property>"));
    let description = xml.find("blti:description").unwrap();
    let launch = xml.find("blti:launch_url").unwrap();
    assert!(description < launch);
}

#[test]
fn text_is_escaped() {
    let xml = Generator::new("Q&A <Live>", "qa", "https://tools.example.edu/qa?a=1&b=\"2\"")
        .unwrap()
        .save_xml();
    assert!(xml.contains("<blti:title>Q&amp;A &lt;Live&gt;</blti:title>"));
    assert!(xml.contains("https://tools.example.edu/qa?a=1&amp;b=&quot;2&quot;"));
    assert!(!xml.contains("Q&A"));
}

#[test]
fn option_properties_override_defaults() {
    let mut generator = generator();
    generator.set_option("editor", [("text", "Insert Grades"), ("icon_url", "e.png")]).unwrap();
    generator.set_option_property("account_navigation", "enabled", "true").unwrap();
    let xml = generator.save_xml();

    assert!(!xml.contains("course_navigation"));
    let editor = xml.find("<lticm:options name=\"editor\">").unwrap();
    let account = xml.find("<lticm:options name=\"account_navigation\">").unwrap();
    assert!(editor < account);
    assert!(xml.contains("<lticm:property name=\"text\">Insert Grades</lticm:property>"));
    assert!(xml.contains("<lticm:property name=\"icon_url\">e.png</lticm:property>"));
    assert_eq!(xml.matches("<lticm:property name=\"text\">Grade Sync</lticm:property>").count(), 1);
    assert_eq!(xml.matches("<lticm:property name=\"url\">").count(), 2);
}

#[test]
fn set_option_replaces_previous_properties() {
    let mut generator = generator();
    generator.set_option("editor", [("text", "Old")]).unwrap();
    generator.set_option("editor", [("url", "https://tools.example.edu/editor")]).unwrap();
    let xml = generator.save_xml();
    assert!(!xml.contains(">Old<"));
    let url = "<lticm:property name=\"url\">https://tools.example.edu/editor</lticm:property>";
    assert!(xml.contains(url));
    assert_eq!(xml.matches("<lticm:options").count(), 1);
}

#[test]
fn empty_required_fields_are_rejected() {
    for (name, id, url) in [("", "id", LAUNCH_URL), ("Name", " ", LAUNCH_URL), ("Name", "id", "")] {
        let err = Generator::new(name, id, url).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidToolProvider(_)));
    }
}

#[test]
fn unknown_privacy_and_option_are_rejected() {
    let err = generator().with_launch_privacy("secret").unwrap_err();
    assert_eq!(err, ConfigurationError::InvalidPrivacyLevel("secret".to_string()));

    let mut generator = generator();
    let err = generator.set_option("sidebar", [("text", "x")]).unwrap_err();
    assert_eq!(err, ConfigurationError::InvalidOption("sidebar".to_string()));
    let err = generator.set_option_property("sidebar", "text", "x").unwrap_err();
    assert_eq!(err, ConfigurationError::InvalidOption("sidebar".to_string()));
}

#[test]
fn metadata_defaults_to_public_privacy_and_carries_placements() {
    let mut properties = BTreeMap::new();
    properties.insert("text".to_string(), "Grades".to_string());
    let metadata = ToolMetadata {
        id: Some(ToolId::new("grades_1234")),
        name: Some("Grade Sync".to_string()),
        launch_url: Some(LAUNCH_URL.to_string()),
        placements: vec![PlacementConfig {
            option: "user_navigation".to_string(),
            properties,
        }],
        ..ToolMetadata::default()
    };
    let xml = Generator::from_metadata(&metadata).unwrap().save_xml();
    assert!(xml.contains("<lticm:property name=\"privacy_level\">public</lticm:property>"));
    assert!(xml.contains("<lticm:options name=\"user_navigation\">"));
    assert!(xml.contains("<lticm:property name=\"text\">Grades</lticm:property>"));
}

#[test]
fn metadata_without_launch_url_is_rejected() {
    let metadata = ToolMetadata {
        id: Some(ToolId::new("grades_1234")),
        name: Some("Grade Sync".to_string()),
        ..ToolMetadata::default()
    };
    let err = Generator::from_metadata(&metadata).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidToolProvider(_)));
}

/// Reverses the five predefined entities.
fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

proptest! {
    #[test]
    fn title_text_survives_escaping(name in "[ -~]{1,40}") {
        prop_assume!(!name.trim().is_empty());
        let xml = Generator::new(name.clone(), "id", LAUNCH_URL).unwrap().save_xml();
        let start = xml.find("<blti:title>").unwrap() + "<blti:title>".len();
        let end = xml[start ..].find("</blti:title>").unwrap() + start;
        let rendered = &xml[start .. end];
        prop_assert!(!rendered.contains('<'));
        prop_assert_eq!(unescape(rendered), name);
    }
}
