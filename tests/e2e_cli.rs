//! CLI end-to-end tests
//!
//! Tests for the streamwarden command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the streamwarden binary
#[allow(deprecated)]
fn streamwarden_cmd() -> Command {
    Command::cargo_bin("streamwarden").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = streamwarden_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = streamwarden_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("streamwarden"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = streamwarden_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("streamwarden"));
}

#[test]
fn test_cli_start_help() {
    let mut cmd = streamwarden_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the supervisor"));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = streamwarden_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_validate_defaults() {
    let mut cmd = streamwarden_cmd();
    cmd.arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"))
        .stdout(predicate::str::contains("ch1"));
}

#[test]
fn test_cli_validate_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("streamwarden.json");
    fs::write(
        &path,
        r#"{
            "server": {"port": 9100},
            "channels": [
                {"name": "news", "host": "upstream-a"},
                {"name": "sport", "host": "upstream-b", "port": 7000}
            ]
        }"#,
    )
    .unwrap();

    let mut cmd = streamwarden_cmd();
    cmd.args(["validate", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("9100"))
        .stdout(predicate::str::contains("sport -> upstream-b:7000"));
}

#[test]
fn test_cli_validate_invalid_json_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let mut cmd = streamwarden_cmd();
    cmd.args(["validate", path.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn test_cli_history_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("streamwarden.json");
    let history = dir.path().join("history.jsonl");
    fs::write(
        &path,
        format!(
            r#"{{"storage": {{"history_file": {}}}}}"#,
            serde_json::to_string(&history).unwrap()
        ),
    )
    .unwrap();

    let mut cmd = streamwarden_cmd();
    cmd.args(["--config", path.to_str().unwrap(), "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No history recorded"));
}

#[test]
fn test_cli_history_lists_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("streamwarden.json");
    let history = dir.path().join("history.jsonl");
    fs::write(
        &history,
        concat!(
            r#"{"time":"2026-01-02T10:00:00Z","channel":"ch1","external_id":"first","title":"Channel 1","duration":null,"event":"start"}"#,
            "\n",
            r#"{"time":"2026-01-02T11:00:00Z","channel":"ch1","external_id":"first","title":"Channel 1","duration":3600,"event":"stop"}"#,
            "\n",
        ),
    )
    .unwrap();
    fs::write(
        &path,
        format!(
            r#"{{"storage": {{"history_file": {}}}}}"#,
            serde_json::to_string(&history).unwrap()
        ),
    )
    .unwrap();

    let mut cmd = streamwarden_cmd();
    cmd.args(["--config", path.to_str().unwrap(), "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first"))
        .stdout(predicate::str::contains("(01:00:00)"));
}
