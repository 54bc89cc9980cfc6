//! CLI-level smoke tests: flag validation only, no network access.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_lists_flags() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--conns"))
        .stdout(predicate::str::contains("--resume"))
        .stdout(predicate::str::contains("--chunks"));
}

#[test]
fn chunks_and_chunk_size_are_mutually_exclusive() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.args(["--chunks", "4", "--chunk-size", "1024", "http://example.invalid/f.bin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn http_user_without_http_pass_is_rejected() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.args(["--http-user", "alice", "http://example.invalid/f.bin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn zero_conns_is_rejected() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.args(["--conns", "0", "http://example.invalid/f.bin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--conns must be greater than 0"));
}

#[test]
fn verify_with_multiple_urls_is_rejected() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.args([
        "--verify",
        "sha256=abc",
        "http://example.invalid/a.bin",
        "http://example.invalid/b.bin",
    ])
    .write_stdin("")
    .assert()
    .failure()
    .stderr(predicate::str::contains("--verify can only be used with exactly one URL"));
}

#[test]
fn no_urls_given_is_rejected() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.write_stdin("").assert().failure().stderr(predicate::str::contains("no URLs given"));
}

#[test]
fn nonexistent_output_dir_is_rejected() {
    let mut cmd = Command::cargo_bin("parafetch").unwrap();
    cmd.args(["--output", "/nonexistent/path/for/parafetch-cli-tests", "http://example.invalid/f.bin"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("output directory does not exist"));
}
