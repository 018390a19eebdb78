//! Integration tests for application config parsing and file validation.

use std::path::{Path, PathBuf};

use churnwise_cli::config::{load_app_config, validate_tsv_or_csv_file, AppConfig};

// ---------------------------------------------------------------------------
// validate_tsv_or_csv_file
// ---------------------------------------------------------------------------

#[test]
fn validate_csv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_or_csv_file(&path).is_ok());
}

#[test]
fn validate_tsv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.TSV");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_or_csv_file(&path).is_ok());
}

#[test]
fn validate_wrong_extension_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_or_csv_file(&path).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_tsv_or_csv_file(Path::new("/nonexistent/path/data.csv")).is_err());
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[test]
fn app_config_defaults() {
    let cfg = AppConfig::default();
    assert_eq!(cfg.data_path, PathBuf::from("data/raw/customer_data.csv"));
    assert_eq!(cfg.model_dir, PathBuf::from("models"));
    assert_eq!(cfg.bind_address(), "0.0.0.0:5000");
    assert_eq!(cfg.pipeline.test_size, 0.25);
}

#[test]
fn artifact_paths_live_in_model_dir() {
    let cfg = AppConfig {
        model_dir: PathBuf::from("/srv/churn"),
        ..AppConfig::default()
    };
    let paths = cfg.artifact_paths();
    assert_eq!(paths.metrics, PathBuf::from("/srv/churn/model_metrics.json"));
    assert_eq!(paths.decision_tree, PathBuf::from("/srv/churn/decision_tree_model.json"));
}

#[test]
fn load_partial_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("churnwise.json");
    std::fs::write(
        &path,
        r#"{"port": 8080, "pipeline": {"models": {"decision_tree": {"max_depth": 3}}}}"#,
    )
    .unwrap();

    let cfg = load_app_config(&path).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.host, "0.0.0.0");
    assert_eq!(cfg.pipeline.models.decision_tree.max_depth, 3);
    assert_eq!(cfg.pipeline.models.decision_tree.min_samples_leaf, 2);
}

#[test]
fn load_invalid_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ nope").unwrap();
    let err = load_app_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

#[test]
fn config_serializes_to_json() {
    let json = serde_json::to_string_pretty(&AppConfig::default()).unwrap();
    assert!(json.contains("data_path"));
    assert!(json.contains("model_dir"));
    assert!(json.contains("n_neighbors"));
}
