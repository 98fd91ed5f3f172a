//! CLI smoke tests for studyctl
//!
//! Everything that talks to a server is covered by unit tests against a mock
//! API; these only verify the binary's argument surface.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("studyctl")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("interactive")
                .and(predicate::str::contains("plan"))
                .and(predicate::str::contains("task"))
                .and(predicate::str::contains("search")),
        );
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("studyctl")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("studyctl"));
}

#[test]
fn test_no_arguments_shows_help() {
    Command::cargo_bin("studyctl").unwrap().assert().failure();
}

#[test]
fn test_plan_rejects_bad_update_steps() {
    Command::cargo_bin("studyctl")
        .unwrap()
        .args(["plan", "learn rust", "--update-steps", "one,two"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --update-steps"));
}
