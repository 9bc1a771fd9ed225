//! Integration tests for the weft CLI
//!
//! These tests run the actual binary against the fixtures in
//! `tests/fixtures` with the mock provider.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn weft_cmd() -> Command {
    let mut cmd = Command::cargo_bin("weft").unwrap();
    cmd.env_remove("WEFT_PROVIDER")
        .env_remove("WEFT_MODEL")
        .env_remove("OPENAI_API_KEY")
        .env("RUST_LOG", "warn");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn help_lists_subcommands() {
    weft_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn run_routes_through_decision() {
    weft_cmd()
        .args(["run", "--provider", "mock", "--context"])
        .arg(fixture("context.yaml"))
        .arg(fixture("greeting.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Output:"))
        .stdout(predicate::str::contains("reply: Bot cheers Ana"))
        .stdout(predicate::str::contains("console").and(predicate::str::contains("skipped")));
}

#[test]
fn run_with_final_override() {
    weft_cmd()
        .args(["run", "-p", "mock", "--final", "classify", "--context"])
        .arg(fixture("context.yaml"))
        .arg(fixture("greeting.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Happy"));
}

#[test]
fn run_fanout_prints_gathered_list() {
    weft_cmd()
        .args(["run", "--provider", "mock"])
        .arg(fixture("topics.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("note on rust"))
        .stdout(predicate::str::contains("note on yaml"));
}

#[test]
fn run_with_events_dumps_log() {
    weft_cmd()
        .args(["run", "--provider", "mock", "--events"])
        .arg(fixture("topics.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"fanout_finalized\""))
        .stdout(predicate::str::contains("\"type\": \"pipeline_completed\""));
}

#[test]
fn run_without_provider_fails_with_fix() {
    let home = TempDir::new().unwrap();
    weft_cmd()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .arg("run")
        .arg(fixture("greeting.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no provider configured"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn run_missing_file_fails() {
    weft_cmd()
        .args(["run", "--provider", "mock", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("WEFT-003"));
}

#[test]
fn run_unknown_task_type_fails() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.yaml");
    fs::write(&file, "tasks:\n  - { id: a, type: shell, command: ls }\n").unwrap();

    weft_cmd()
        .args(["run", "--provider", "mock"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("WEFT-011"))
        .stderr(predicate::str::contains("shell"));
}

#[test]
fn run_stall_names_pending_task() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("stall.yaml");
    fs::write(
        &file,
        "tasks:\n  - { id: a, type: computation, prompt: x, depends_on: a }\n",
    )
    .unwrap();

    weft_cmd()
        .args(["run", "--provider", "mock"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("WEFT-021"))
        .stderr(predicate::str::contains("never executed: a"));
}

#[test]
fn validate_reports_summary() {
    weft_cmd()
        .arg("validate")
        .arg(fixture("greeting.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Tasks: 5"))
        .stdout(predicate::str::contains("Final: reply"));
}

#[test]
fn validate_warns_about_cycles_and_unknown_functions() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("warn.yaml");
    fs::write(
        &file,
        r#"
tasks:
  - { id: a, type: computation, prompt: "{{outputs.b}}" }
  - { id: b, type: computation, prompt: "{{outputs.a}}" }
  - { id: c, type: function, function: "custom::thing" }
"#,
    )
    .unwrap();

    weft_cmd()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("WEFT-020"))
        .stdout(predicate::str::contains("custom::thing"));
}

#[test]
fn config_show_masks_key() {
    let home = TempDir::new().unwrap();
    weft_cmd()
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("OPENAI_API_KEY", "sk-test-1234567890")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai"))
        .stdout(predicate::str::contains("sk-test-1234567890").not());
}
