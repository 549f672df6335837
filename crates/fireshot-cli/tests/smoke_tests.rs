//! Smoke tests for the fireshot binary
//!
//! None of these launch a browser: they cover argument handling, plan
//! listing and the failure paths that stop before Chromium starts.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the fireshot binary
fn fireshot() -> Command {
    let mut cmd = Command::cargo_bin("fireshot").expect("fireshot binary should exist");
    cmd.env_remove("FIRESHOT_PLAN")
        .env_remove("FIRESHOT_BASE_URL")
        .env_remove("FIRESHOT_OUTPUT_DIR");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    fireshot()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    fireshot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("show-plan"))
        .stdout(predicate::str::contains("--plan-file"))
        .stdout(predicate::str::contains("--lenient"));
}

#[test]
fn test_unknown_flag_rejected() {
    fireshot().arg("--frobnicate").assert().failure();
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_plans_lists_presets() {
    fireshot()
        .arg("plans")
        .assert()
        .success()
        .stdout(predicate::str::contains("fire"))
        .stdout(predicate::str::contains("fire-ui-v2"))
        .stdout(predicate::str::contains("cash_flow_page_generic.png"));
}

#[test]
fn test_plans_json() {
    let output = fireshot()
        .args(["plans", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let plans: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(plans.as_array().unwrap().len(), 3);
    assert_eq!(plans[0]["name"], "fire");
}

#[test]
fn test_show_plan_yaml() {
    fireshot()
        .args(["show-plan", "fire", "--base-url", "http://127.0.0.1:4000/asset/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:4000/asset/fire"))
        .stdout(predicate::str::contains("asset-google-id-token"))
        .stdout(predicate::str::contains("debug_fire_3.png"));
}

#[test]
fn test_show_plan_unknown() {
    fireshot()
        .args(["show-plan", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown plan"));
}

#[test]
fn test_fixture_prints_payload() {
    fireshot()
        .arg("fixture")
        .assert()
        .success()
        .stdout(predicate::str::contains("63715211"))
        .stdout(predicate::str::contains("assetsYen"));
}

// ============================================================================
// Run failures before launch
// ============================================================================

#[test]
fn test_run_unknown_plan_fails() {
    fireshot()
        .args(["--plan", "nope"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_run_missing_plan_file_fails() {
    let temp = TempDir::new().unwrap();
    fireshot()
        .args(["run", "--plan-file"])
        .arg(temp.path().join("missing.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_run_invalid_plan_file_fails() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("plan.yaml");
    fs::write(&path, "name: broken\nnavigation: []\n").unwrap();

    fireshot()
        .args(["run", "--plan-file"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid plan"));
}
