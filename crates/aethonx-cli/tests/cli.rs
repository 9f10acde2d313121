// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end tests against the built `aethonx` binary: a full scan over
//! the mock source registry, exercised through the same flag surface a
//! real invocation would use.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn scan_against_mock_registry_writes_result_json() {
    let out = tempfile::tempdir().unwrap();

    Command::cargo_bin("aethonx")
        .unwrap()
        .args([
            "--target",
            "example.com",
            "--out",
            out.path().to_str().unwrap(),
            "--quiet",
        ])
        .assert()
        .success();

    let result_path = out.path().join("result.json");
    let contents = std::fs::read_to_string(&result_path)
        .unwrap_or_else(|e| panic!("expected {} to exist: {e}", result_path.display()));
    let document: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(document["target"]["root"], "example.com");
    assert!(document["artifacts"].as_array().unwrap().len() > 0);
}

#[test]
fn missing_target_exits_with_config_error_code() {
    Command::cargo_bin("aethonx")
        .unwrap()
        .env_remove("AETHONX_TARGET")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn invalid_target_exits_with_config_error_code() {
    let out = tempfile::tempdir().unwrap();

    Command::cargo_bin("aethonx")
        .unwrap()
        .args(["--target", "", "--out", out.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(2);
}
