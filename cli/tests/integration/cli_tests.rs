//! End-to-end tests for argument parsing, validation and the host-side
//! dependency commands.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A binary invocation rooted in `dir`, with metrics kept inside it.
fn capsulate(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("git-capsulate"));
    cmd.env("NO_COLOR", "1")
        .env("CAPSULATE_YES", "1")
        .env_remove("CAPSULATE_CONFIG")
        .env("GIT_CAPSULATE_METRICS_PATH", dir.path().join("metrics"))
        .arg("--root")
        .arg(dir.path());
    cmd
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// --- Help and version ---

#[test]
fn test_no_args_shows_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("git-capsulate"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Isolated Git agents in containers"));
}

#[test]
fn test_help_lists_lifecycle_commands() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("sync-deps"))
        .stdout(predicate::str::contains("overlay-status"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("git-capsulate"));
}

#[test]
fn test_unknown_level_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .args(["create", "a1", "--level", "galaxy"])
        .assert()
        .code(2);
}

// --- Validation before any container work ---

#[test]
fn test_create_team_level_without_team_fails() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .args(["create", "a1", "--level", "team"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_create_invalid_id_reports_json_error_code() {
    let dir = TempDir::new().unwrap();
    let output = capsulate(&dir)
        .args(["--json", "create", "bad/id"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let body = json_stdout(&output);
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "invalid_config");
}

#[test]
fn test_destroy_unknown_agent_is_not_found() {
    let dir = TempDir::new().unwrap();
    let output = capsulate(&dir)
        .args(["--json", "destroy", "ghost"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert_eq!(json_stdout(&output)["code"], "agent_not_found");
}

#[test]
fn test_list_deps_unknown_agent_fails() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .args(["list-deps", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Agent 'ghost' not found."));
}

// --- Shared dependency tiers ---

#[test]
fn test_add_core_dep_writes_marker() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .args(["add-core-dep", "react", "18.2.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added react@18.2.0 to the core tier"));

    let marker = dir
        .path()
        .join(".capsulate/dependencies/core/react/version");
    assert_eq!(std::fs::read_to_string(marker).unwrap(), "18.2.0\n");
}

#[test]
fn test_add_team_dep_creates_team_json() {
    let dir = TempDir::new().unwrap();
    let output = capsulate(&dir)
        .args(["--json", "add-team-dep", "frontend", "vue"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = json_stdout(&output);
    assert_eq!(body["team_id"], "frontend");
    assert_eq!(body["version"], "latest");
    assert!(
        dir.path()
            .join(".capsulate/dependencies/team/frontend/vue")
            .is_dir()
    );
}

#[test]
fn test_add_core_dep_rejects_path_package() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir)
        .args(["add-core-dep", "../escape"])
        .assert()
        .failure();
    assert!(!dir.path().join(".capsulate/dependencies/escape").exists());
}

// --- Metrics ---

#[test]
fn test_metrics_recorded_across_runs() {
    let dir = TempDir::new().unwrap();
    capsulate(&dir).args(["create-team", "backend"]).assert().success();
    capsulate(&dir)
        .args(["add-core-dep", "lodash"])
        .assert()
        .success();

    let output = capsulate(&dir)
        .args(["metrics", "show", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let body = json_stdout(&output);
    assert_eq!(
        body["categories"]["dependency_ops"]["add_core_dependency"]["count"],
        1
    );

    capsulate(&dir).args(["metrics", "clear"]).assert().success();
    capsulate(&dir)
        .args(["metrics", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No metrics recorded"));
}
