//! Integration tests for argument handling and the agent run entry point.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn fleetwatch() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("fleetwatch"));
    for var in [
        "FLEETWATCH_WORKDIR",
        "FLEETWATCH_TOKEN",
        "FLEETWATCH_URL",
        "FLEETWATCH_ASSET_NAME",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("FLEETWATCH_LOG", "error");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_help_lists_subcommands_and_flags() {
    fleetwatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("keygen"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--token"));
}

#[test]
fn test_version_flag_shows_crate_version() {
    fleetwatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_version_command_shows_tag() {
    fleetwatch()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("fleetwatch "))
        .stdout(predicate::str::contains("(tag v"));
}

#[test]
fn test_unknown_flag_is_rejected() {
    fleetwatch()
        .arg("--no-such-flag")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"));
}

// --- Agent run argument validation ---

#[test]
fn test_run_without_token_fails() {
    let dir = TempDir::new().unwrap();
    fleetwatch()
        .args(["--workdir"])
        .arg(dir.path())
        .args(["--url", "https://collector.example/ingest"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--token argument is missing"));
}

#[test]
fn test_run_without_url_fails() {
    let dir = TempDir::new().unwrap();
    fleetwatch()
        .args(["--workdir"])
        .arg(dir.path())
        .args(["--token", "abc"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--url argument is missing"));
}

#[test]
fn test_dry_run_prints_report_with_cached_identity() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cache");
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(
        cache.join("instanceID"),
        r#"{"id": "i-cached", "cloud": "AWS", "addr": "10.1.2.3"}"#,
    )
    .unwrap();

    let output = fleetwatch()
        .arg("--dry-run")
        .arg("--workdir")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["instance"]["id"], "i-cached");
    assert_eq!(report["instance"]["cloud"], "AWS");
    assert!(report["version"].as_str().unwrap().starts_with('v'));
    assert!(report["stat"]["cores_number"].as_u64().unwrap() >= 1);
    assert!(report["stat"]["disk"]["usage"].is_array());
    assert!(!dir.path().join("updates").exists(), "dry run must not prepare updates");
}
