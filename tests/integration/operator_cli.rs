//! End-to-end tests of the `credhub-acceptance` operator binary.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn operator() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("credhub-acceptance"))
}

#[test]
fn test_cli_help() {
    operator()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("certs"));
}

#[test]
fn test_completions_bash() {
    operator()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}

#[test]
fn test_name_prints_unique_names() {
    let first = operator().arg("name").output().unwrap();
    let second = operator().arg("name").output().unwrap();
    let first = String::from_utf8(first.stdout).unwrap();
    let second = String::from_utf8(second.stdout).unwrap();

    assert!(first.starts_with("TEST-CREDENTIALS-"));
    assert_ne!(first, second);
}

#[test]
fn test_name_with_path_suffix() {
    operator()
        .args(["name", "--path", "some-certificate"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^/acceptance/\d+/some-certificate\n$").unwrap());
}

#[test]
fn test_config_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    operator()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_config_malformed_file_fails() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json"), r#"{"credential_root": "/tmp"}"#).unwrap();
    operator()
        .current_dir(dir.path())
        .arg("config")
        .env_remove("CREDHUB_ACCEPTANCE_API_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed config"));
}

#[test]
fn test_config_prints_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("suite.json");
    std::fs::write(
        &path,
        r#"{"api_url": "https://credhub.example.com:8844", "client_secret": "hunter2"}"#,
    )
    .unwrap();
    operator()
        .args(["config", "--config"])
        .arg(&path)
        .env_remove("CREDHUB_ACCEPTANCE_API_URL")
        .assert()
        .success()
        .stdout(predicate::str::contains("https://credhub.example.com:8844"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_certs_writes_fixtures() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("certs");
    operator()
        .args(["certs", "--out"])
        .arg(&out)
        .assert()
        .success();
    for file in ["ca.pem", "client.pem", "client_key.pem", "expired.pem", "intermediate_ca.pem"] {
        assert!(out.join(file).is_file(), "missing {file}");
    }
}

#[test]
fn test_probe_with_missing_certificate_fails() {
    let dir = TempDir::new().unwrap();
    operator()
        .args(["certs", "--out"])
        .arg(dir.path())
        .assert()
        .success();

    operator()
        .args(["probe", "--url", "https://127.0.0.1:1", "--ca"])
        .arg(dir.path().join("ca.pem"))
        .arg("--cert")
        .arg(dir.path().join("missing.pem"))
        .arg("--key")
        .arg(dir.path().join("client_key.pem"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Fixture file not found"));
}

#[test]
fn test_probe_against_closed_port_is_rejected() {
    let dir = TempDir::new().unwrap();
    operator()
        .args(["certs", "--out"])
        .arg(dir.path())
        .assert()
        .success();

    operator()
        .args(["probe", "--url", "https://127.0.0.1:1", "--ca"])
        .arg(dir.path().join("ca.pem"))
        .arg("--cert")
        .arg(dir.path().join("client.pem"))
        .arg("--key")
        .arg(dir.path().join("client_key.pem"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("rejected"));
}
