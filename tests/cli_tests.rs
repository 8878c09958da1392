//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the taskrunner binary
fn runner_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskrunner").unwrap();
    cmd.env_remove("TASKRUNNER_CONFIG");
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    runner_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Task Runner"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("version"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    runner_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("taskrunner "))
        .stdout(predicate::str::contains("Built:"))
        .stdout(predicate::str::contains("Target:"));
}

#[test]
fn test_short_version_flag() {
    runner_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("taskrunner"));
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_default() {
    runner_cmd()
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[worker]"))
        .stdout(predicate::str::contains("[server]"))
        .stdout(predicate::str::contains("[retry]"))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_validate_default() {
    runner_cmd()
        .arg("config")
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    runner_cmd()
        .arg("config")
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/path/config.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found").or(predicate::str::contains("Error")));
}

#[test]
fn test_config_init_writes_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("taskrunner.toml");

    runner_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written to"));

    assert!(path.exists());

    // The generated file must itself be valid
    runner_cmd()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("taskrunner.toml");
    std::fs::write(&path, "# existing\n").unwrap();

    runner_cmd()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    runner_cmd()
        .args(["config", "init", "--force", "--path"])
        .arg(&path)
        .assert()
        .success();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("[server]"));
}

#[test]
fn test_config_init_help() {
    runner_cmd()
        .arg("config")
        .arg("init")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialize"))
        .stdout(predicate::str::contains("--path"))
        .stdout(predicate::str::contains("--force"));
}

// ─────────────────────────────────────────────────────────────────
// Run Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    runner_cmd()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Run the configured workers"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_run_with_missing_config() {
    runner_cmd()
        .arg("run")
        .arg("--config")
        .arg("/nonexistent/config.toml")
        .assert()
        .failure()
        .code(10);
}

#[test]
fn test_run_rejects_unknown_handler() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("taskrunner.toml");
    std::fs::write(
        &path,
        r#"
[[tasks]]
task_type = "encode"
handler = "transcode"
"#,
    )
    .unwrap();

    runner_cmd()
        .arg("run")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown handler 'transcode'"));
}

// ─────────────────────────────────────────────────────────────────
// Verbosity Flag Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flag() {
    runner_cmd().arg("-v").arg("version").assert().success();
}

#[test]
fn test_very_verbose_flag() {
    runner_cmd().arg("-vv").arg("version").assert().success();
}

#[test]
fn test_quiet_flag() {
    runner_cmd().arg("--quiet").arg("version").assert().success();
}

// ─────────────────────────────────────────────────────────────────
// Error Handling Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_unknown_command() {
    runner_cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    runner_cmd().assert().failure();
}
