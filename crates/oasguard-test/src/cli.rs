//! CLI regression tests for the `oasguard` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes, and report output.
//!
//! Run with: `cargo test -p oasguard-test`
//! Requires the `oasguard` binary to be built first (`cargo build -p oasguard`).

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `oasguard` binary.
fn oasguard() -> Command {
    // cargo_bin is deprecated for custom build-dir setups; fine for standard workspace use.
    #[allow(deprecated)]
    Command::cargo_bin("oasguard")
        .expect("oasguard binary not found, run `cargo build -p oasguard` first")
}

/// Absolute path to the shared test fixtures directory.
fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/oasguard-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

/// `oasguard --old <v1> --new <fixture>` with the given fixture as the new spec.
fn compare_with(new: &str) -> Command {
    let mut cmd = oasguard();
    cmd.arg("--old")
        .arg(fixtures().join("petstore-v1.yaml"))
        .arg("--new")
        .arg(fixtures().join(new));
    cmd
}

// ---------------------------------------------------------------------------
// Exit policy
// ---------------------------------------------------------------------------

#[test]
fn identical_specs_exit_zero() {
    compare_with("petstore-v1.yaml")
        .assert()
        .success()
        .stdout(contains("No differences. Specifications are equivalent"));
}

#[test]
fn compatible_change_exits_zero() {
    compare_with("petstore-v2-compatible.yaml")
        .assert()
        .success()
        .stdout(contains("API changes are backward compatible"))
        .stdout(contains("/health"));
}

#[test]
fn breaking_change_exits_one() {
    compare_with("petstore-v2-breaking.yaml")
        .assert()
        .failure()
        .code(1)
        .stdout(contains("API changes broke backward compatibility"))
        .stdout(contains("What's Deleted"))
        .stdout(contains("/pets/{petId}"));
}

#[test]
fn fail_on_changed_rejects_compatible_change() {
    compare_with("petstore-v2-compatible.yaml")
        .args(["--exit", "fail-on-changed"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn fail_on_changed_accepts_identical_specs() {
    compare_with("petstore-v1.yaml")
        .args(["-e", "fail-on-changed"])
        .assert()
        .success();
}

#[test]
fn print_state_always_exits_zero() {
    compare_with("petstore-v2-breaking.yaml")
        .args(["-e", "print-state"])
        .assert()
        .success()
        .stdout(contains("breaking"))
        .stdout(contains("API CHANGE LOG").not());
}

#[test]
fn print_state_with_console_prints_report_too() {
    compare_with("petstore-v2-compatible.yaml")
        .args(["-e", "print-state", "-c"])
        .assert()
        .success()
        .stdout(contains("API CHANGE LOG"))
        .stdout(contains("compatible"));
}

#[test]
fn unknown_exit_policy_is_rejected() {
    compare_with("petstore-v1.yaml")
        .args(["-e", "sometimes"])
        .assert()
        .failure()
        .code(2);
}

// ---------------------------------------------------------------------------
// Report files
// ---------------------------------------------------------------------------

#[test]
fn markdown_report_is_written() {
    let tmp = TempDir::new().expect("tempdir");
    let report = tmp.path().join("changes.md");

    compare_with("petstore-v2-breaking.yaml")
        .arg("--markdown")
        .arg(&report)
        .assert()
        .code(1)
        .stdout(contains("API CHANGE LOG").not());

    let body = std::fs::read_to_string(&report).expect("markdown report");
    assert!(body.starts_with("### API Changelog petstore-v1 -> petstore-v2-breaking"));
    assert!(body.contains("#### What's Deleted"));
    assert!(body.contains("**API changes broke backward compatibility**"));
}

#[test]
fn html_and_text_reports_are_written() {
    let tmp = TempDir::new().expect("tempdir");
    let html = tmp.path().join("changes.html");
    let text = tmp.path().join("changes.txt");

    compare_with("petstore-v2-compatible.yaml")
        .arg("--html")
        .arg(&html)
        .arg("--text")
        .arg(&text)
        .assert()
        .success();

    let html = std::fs::read_to_string(&html).expect("html report");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("/health"));

    let text = std::fs::read_to_string(&text).expect("text report");
    assert!(text.contains("API CHANGE LOG"));
    assert!(text.contains("API changes are backward compatible"));
}

#[test]
fn json_report_is_the_change_tree() {
    let tmp = TempDir::new().expect("tempdir");
    let report = tmp.path().join("changes.json");

    compare_with("petstore-v2-breaking.yaml")
        .arg("--json")
        .arg(&report)
        .assert()
        .code(1);

    let body = std::fs::read_to_string(&report).expect("json report");
    let tree: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(tree["verdict"], "breaking");
    assert_eq!(tree["element"]["type"], "specification");
    assert_eq!(tree["element"]["old"], "petstore-v1");
    assert_eq!(tree["element"]["new"], "petstore-v2-breaking");
}

#[test]
fn unwritable_report_does_not_change_exit_code() {
    let tmp = TempDir::new().expect("tempdir");

    // A directory cannot be written as a file.
    compare_with("petstore-v2-compatible.yaml")
        .arg("--markdown")
        .arg(tmp.path())
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// Load errors
// ---------------------------------------------------------------------------

#[test]
fn missing_file_exits_two() {
    oasguard()
        .args(["--old", "this-file-does-not-exist.yaml", "--new"])
        .arg(fixtures().join("petstore-v1.yaml"))
        .assert()
        .failure()
        .code(2)
        .stderr(contains("not found"));
}

#[test]
fn non_openapi_document_exits_two() {
    compare_with("not-openapi.yaml")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("E1001"));
}

#[test]
fn unsupported_openapi_version_exits_two() {
    compare_with("openapi-4.yaml")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("E1001"))
        .stderr(contains("openapi-4.yaml"));
}

#[test]
fn invalid_parameter_is_tolerated_by_default() {
    oasguard()
        .arg("--old")
        .arg(fixtures().join("invalid-param.yaml"))
        .arg("--new")
        .arg(fixtures().join("invalid-param.yaml"))
        .assert()
        .success();
}

#[test]
fn strict_rejects_invalid_parameter() {
    oasguard()
        .arg("--old")
        .arg(fixtures().join("invalid-param.yaml"))
        .arg("--new")
        .arg(fixtures().join("invalid-param.yaml"))
        .arg("--strict")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("E1005"));
}

#[test]
fn missing_required_flag_is_a_usage_error() {
    oasguard()
        .arg("--old")
        .arg(fixtures().join("petstore-v1.yaml"))
        .assert()
        .failure()
        .code(2)
        .stderr(contains("--new"));
}
