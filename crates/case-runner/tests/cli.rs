use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn write_definition(name: &str, content: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time must be monotonic")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("case-runner-cli-{}-{nanos}-{name}", std::process::id()));
    fs::write(&path, content).expect("must write definition");
    path
}

#[test]
fn validate_prints_summary_for_valid_definition() {
    let path = write_definition(
        "ok.json",
        r#"{"key":"tiny","plan_model":{"id":"root","kind":"stage","children":[{"id":"only","kind":"task"}]}}"#,
    );
    Command::cargo_bin("case-runner")
        .expect("binary is built")
        .args(["validate", "--definition"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("case definition ok"))
        .stdout(predicate::str::contains("key: tiny"));
}

#[test]
fn validate_fails_with_issue_list_on_stderr() {
    let path = write_definition(
        "broken.json",
        r#"{"key":"","plan_model":{"id":"root","kind":"stage"}}"#,
    );
    Command::cargo_bin("case-runner")
        .expect("binary is built")
        .args(["validate", "--definition"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("case definition rejected"))
        .stderr(predicate::str::contains("definition.key.empty"));
}

#[test]
fn run_prints_events_as_jsonl_to_stdout() {
    let path = write_definition(
        "run.yaml",
        "key: single\nplan_model:\n  id: root\n  kind: stage\n  children:\n    - id: work\n      kind: human_task\n",
    );
    Command::cargo_bin("case-runner")
        .expect("binary is built")
        .args(["run", "--events-jsonl", "-", "--definition"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"case_started\""));
}
