//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `churnwise` binary to verify that
//! argument parsing, help text, and error handling work end-to-end.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("churnwise").unwrap()
}

fn fixture_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/raw/customer_data.csv")
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("train"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("churnwise"));
}

#[test]
fn unknown_subcommand_errors() {
    cmd().arg("rescore").assert().failure();
}

// ---------------------------------------------------------------------------
// Train subcommand
// ---------------------------------------------------------------------------

#[test]
fn train_nonexistent_dataset_errors() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["train", "--data", "/nonexistent/customers.csv", "--model-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("File does not exist"));
}

#[test]
fn train_rejects_wrong_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("customers.txt");
    std::fs::write(&path, "x").unwrap();
    cmd()
        .args(["train", "--data"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains(".tsv or .csv"));
}

#[test]
fn train_nonexistent_config_errors() {
    cmd()
        .args(["train", "/nonexistent/config.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn train_writes_artifacts_and_prints_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("models");

    cmd()
        .args(["train", "--data"])
        .arg(fixture_path())
        .arg("--model-dir")
        .arg(&model_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"decision_tree\""))
        .stdout(predicate::str::contains("\"recommended_model\""));

    for file in [
        "decision_tree_model.json",
        "knn_model.json",
        "scaler.json",
        "label_encoder.json",
        "model_metrics.json",
    ] {
        assert!(model_dir.join(file).exists(), "missing {}", file);
    }
}

// ---------------------------------------------------------------------------
// Serve subcommand
// ---------------------------------------------------------------------------

#[test]
fn serve_help_lists_overrides() {
    cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--model-dir"));
}

#[test]
fn serve_rejects_invalid_port() {
    cmd()
        .args(["serve", "--port", "not-a-port"])
        .assert()
        .failure();
}

#[test]
fn serve_fails_fast_without_dataset() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["serve", "--data", "/nonexistent/customers.csv", "--port", "0", "--model-dir"])
        .arg(dir.path())
        .assert()
        .failure();
}
