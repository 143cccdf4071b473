// crates/lti-toolbox-core/tests/launch_model.rs
// ============================================================================
// Module: Launch Model Tests
// Description: Tests for role derivation, permissions, and Canvas settings.
// Purpose: Ensure permission checks follow the LTI role conventions.
// ============================================================================

//! ## Overview
//! Validates LIS role expansion, the admin > staff > learner priority, and
//! prefix stripping of `custom_canvas_*` settings.

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

use lti_toolbox_core::CanvasSettings;
use lti_toolbox_core::CanvasUser;
use lti_toolbox_core::ConsumerKey;
use lti_toolbox_core::LaunchRequest;
use lti_toolbox_core::LtiUser;
use lti_toolbox_core::Permission;
use lti_toolbox_core::Role;
use lti_toolbox_core::UserId;

fn user(roles: &[&str]) -> LtiUser {
    LtiUser::new(UserId::new("u-1"), ConsumerKey::new("ck"), roles.iter().copied())
}

// ============================================================================
// SECTION: Roles
// ============================================================================

#[test]
fn short_role_names_expand_to_lis_urns() {
    let user = user(&["Instructor", "urn:lti:sysrole:ims/lis/SysAdmin"]);
    assert_eq!(
        user.roles(),
        &[
            "urn:lti:role:ims/lis/Instructor".to_string(),
            "urn:lti:sysrole:ims/lis/SysAdmin".to_string(),
        ]
    );
    assert!(user.has_role("Instructor"));
    assert!(user.has_role("urn:lti:role:ims/lis/Instructor"));
}

#[test]
fn roles_parameter_is_comma_separated() {
    let roles = LtiUser::parse_roles("Learner, urn:lti:instrole:ims/lis/Administrator,,");
    assert_eq!(
        roles,
        vec![
            "urn:lti:role:ims/lis/Learner".to_string(),
            "urn:lti:instrole:ims/lis/Administrator".to_string(),
        ]
    );
}

#[test]
fn role_priority_prefers_admin_then_staff_then_learner() {
    assert_eq!(
        Role::for_user(&user(&["Learner", "Instructor", "Administrator"])),
        Some(Role::Admin)
    );
    assert_eq!(Role::for_user(&user(&["Learner", "TeachingAssistant"])), Some(Role::Staff));
    assert_eq!(Role::for_user(&user(&["ContentDeveloper"])), Some(Role::Staff));
    assert_eq!(Role::for_user(&user(&["Learner"])), Some(Role::Learner));
    assert_eq!(Role::for_user(&user(&["urn:lti:sysrole:ims/lis/SysAdmin"])), Some(Role::Admin));
}

#[test]
fn unrecognized_roles_derive_no_role() {
    // Mentors and guests are deliberately left without a tool role.
    assert_eq!(Role::for_user(&user(&["Mentor"])), None);
    assert_eq!(Role::for_user(&user(&[])), None);
}

#[test]
fn permissions_follow_role_hierarchy() {
    assert!(Role::Admin.grants(Permission::Configure));
    assert!(Role::Admin.grants(Permission::Edit));
    assert!(!Role::Admin.grants(Permission::View));
    assert!(Role::Staff.grants(Permission::Edit));
    assert!(!Role::Staff.grants(Permission::Configure));
    assert!(Role::Learner.grants(Permission::View));
    assert!(!Role::Learner.grants(Permission::Edit));
}

#[test]
fn user_without_role_is_allowed_nothing() {
    let canvas_user = CanvasUser::from_launch(user(&["Mentor"]), &BTreeMap::new());
    assert!(!canvas_user.allows(Permission::View));
    assert!(!canvas_user.allows(Permission::Edit));
    assert!(!canvas_user.allows(Permission::Configure));
}

// ============================================================================
// SECTION: Canvas Settings
// ============================================================================

#[test]
fn canvas_settings_strip_prefix_and_drop_others() {
    let mut settings = BTreeMap::new();
    settings.insert("custom_canvas_course_id".to_string(), "42".to_string());
    settings.insert("custom_canvas_account_id".to_string(), "7".to_string());
    settings.insert("custom_other".to_string(), "x".to_string());
    settings.insert("custom_canvas_".to_string(), "empty".to_string());
    let canvas = CanvasSettings::from_settings(&settings);
    assert_eq!(canvas.get("course_id"), Some("42"));
    assert_eq!(canvas.get("account_id"), Some("7"));
    assert_eq!(canvas.get("custom_canvas_course_id"), None);
    assert_eq!(canvas.get("custom_other"), None);
    assert_eq!(canvas.as_map().len(), 2);
}

// ============================================================================
// SECTION: Launch Requests
// ============================================================================

#[test]
fn is_launching_requires_non_empty_marker() {
    assert!(
        LaunchRequest::from_pairs([("lti_message_type", "basic-lti-launch-request")])
            .is_launching()
    );
    assert!(!LaunchRequest::from_pairs([("lti_message_type", "  ")]).is_launching());
    assert!(!LaunchRequest::from_pairs([("action", "reset")]).is_launching());
}
