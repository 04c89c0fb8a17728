//! Black-box coverage of the `minigit` binary's local commands, driven
//! through the compiled executable rather than by calling library code
//! directly — the CLI surface (argument parsing, exit codes, process
//! output) is what these tests pin down.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use test_case::test_case;

fn minigit() -> Command {
    Command::cargo_bin("minigit").unwrap()
}

#[test]
fn init_creates_a_repository() {
    let dir = TempDir::new().unwrap();
    minigit()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized"));
    assert!(dir.path().join(".minigit").is_dir());
}

#[test]
fn init_twice_fails() {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();
    minigit().current_dir(dir.path()).arg("init").assert().failure();
}

#[test]
fn add_commit_then_log_round_trips() {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("a.txt"), b"hello\n").unwrap();

    minigit()
        .current_dir(dir.path())
        .args(["add", "a.txt"])
        .assert()
        .success();

    minigit()
        .current_dir(dir.path())
        .args(["commit", "-m", "first commit"])
        .assert()
        .success();

    minigit()
        .current_dir(dir.path())
        .args(["log", "--line"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^[0-9a-f]{12} first commit\n$").unwrap());

    minigit()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn status_outside_a_repository_fails_with_a_usage_message() {
    let dir = TempDir::new().unwrap();
    minigit()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a minigit repository"));
}

#[test]
fn reset_hard_restores_a_previous_commit() {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();

    fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
    minigit().current_dir(dir.path()).args(["add", "a.txt"]).assert().success();
    minigit()
        .current_dir(dir.path())
        .args(["commit", "-m", "v1"])
        .assert()
        .success();

    fs::write(dir.path().join("a.txt"), b"v2\n").unwrap();
    minigit().current_dir(dir.path()).args(["add", "a.txt"]).assert().success();
    minigit()
        .current_dir(dir.path())
        .args(["commit", "-m", "v2"])
        .assert()
        .success();

    minigit()
        .current_dir(dir.path())
        .args(["log", "--line"])
        .output()
        .unwrap();

    minigit()
        .current_dir(dir.path())
        .args(["reset", "--hard"])
        .assert()
        .success();
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"v2\n");
}

#[test_case("--soft"; "soft leaves the index and working tree untouched")]
#[test_case("--mixed"; "mixed resets the index but not the working tree")]
#[test_case("--hard"; "hard resets the index and the working tree")]
fn reset_accepts_each_mode_flag(flag: &str) {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("a.txt"), b"v1\n").unwrap();
    minigit().current_dir(dir.path()).args(["add", "a.txt"]).assert().success();
    minigit()
        .current_dir(dir.path())
        .args(["commit", "-m", "v1"])
        .assert()
        .success();

    minigit().current_dir(dir.path()).args(["reset", flag]).assert().success();
}

#[test]
fn set_remote_rejects_a_malformed_url() {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();
    minigit()
        .current_dir(dir.path())
        .args(["set-remote", "not-a-url"])
        .assert()
        .failure();
}

#[test]
fn set_remote_then_status_still_works() {
    let dir = TempDir::new().unwrap();
    minigit().current_dir(dir.path()).arg("init").assert().success();
    minigit()
        .current_dir(dir.path())
        .args(["set-remote", "server://localhost:9418/demo"])
        .assert()
        .success();
    minigit().current_dir(dir.path()).arg("status").assert().success();
}
