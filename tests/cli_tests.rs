//! Binary-level checks: argument handling, step outputs and graceful exit

use assert_cmd::Command;
use predicates::prelude::*;

fn itsm_flow(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("itsm-flow").unwrap();
    cmd.env_clear().current_dir(workdir);
    cmd
}

#[test]
fn test_help_lists_every_command() {
    let dir = tempfile::tempdir().unwrap();
    itsm_flow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create-change-request"))
        .stdout(predicate::str::contains("move-to-deploying"))
        .stdout(predicate::str::contains("move-to-deployed"))
        .stdout(predicate::str::contains("cancel-older-pending-requests"))
        .stdout(predicate::str::contains("can-pr-author-be-assigned"));
}

#[test]
fn test_missing_argument_fails_after_announcing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("github_output");

    itsm_flow(dir.path())
        .env("GITHUB_OUTPUT", &output)
        .arg("can-pr-author-be-assigned")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pr_author_email is required"));

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains("XPLOR_GH_JM=True"));
}

#[test]
fn test_graceful_exit_reports_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    itsm_flow(dir.path())
        .args(["can-pr-author-be-assigned", "--graceful-exit", "yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exception occurred"))
        .stdout(predicate::str::contains("Graceful exit enabled, exiting with code 0"));
}

#[test]
fn test_invalid_flag_value_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    itsm_flow(dir.path())
        .args(["move-to-deploying", "--dry-run", "sometimes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sometimes"));
}

#[test]
fn test_invalid_env_flag_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    itsm_flow(dir.path())
        .env("JSM_DRY_RUN", "perhaps")
        .arg("move-to-deploying")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSM_DRY_RUN"));
}
