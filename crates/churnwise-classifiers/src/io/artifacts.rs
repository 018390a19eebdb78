//! Locations and JSON (de)serialization of the persisted training artifacts.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ChurnError, Result};

pub const DECISION_TREE_FILE: &str = "decision_tree_model.json";
pub const KNN_FILE: &str = "knn_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";
pub const METRICS_FILE: &str = "model_metrics.json";

/// The five files a training run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub decision_tree: PathBuf,
    pub knn: PathBuf,
    pub scaler: PathBuf,
    pub label_encoder: PathBuf,
    pub metrics: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        ArtifactPaths {
            decision_tree: dir.join(DECISION_TREE_FILE),
            knn: dir.join(KNN_FILE),
            scaler: dir.join(SCALER_FILE),
            label_encoder: dir.join(LABEL_ENCODER_FILE),
            metrics: dir.join(METRICS_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.decision_tree,
            &self.knn,
            &self.scaler,
            &self.label_encoder,
            &self.metrics,
        ]
    }

    /// True when every artifact exists and is non-empty.
    pub fn all_present(&self) -> bool {
        self.all().iter().all(|path| {
            fs::metadata(path)
                .map(|meta| meta.is_file() && meta.len() > 0)
                .unwrap_or(false)
        })
    }

    /// Artifacts that are missing or empty.
    pub fn missing(&self) -> Vec<&Path> {
        self.all()
            .into_iter()
            .filter(|path| {
                !fs::metadata(path)
                    .map(|meta| meta.is_file() && meta.len() > 0)
                    .unwrap_or(false)
            })
            .collect()
    }
}

/// Write `value` as pretty JSON, creating parent directories as needed.
/// An existing file is overwritten.
pub fn write_json_artifact<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ChurnError::persistence(path, e))?;
        }
    }

    let file = File::create(path).map_err(|e| ChurnError::persistence(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| ChurnError::persistence(path, e))?;
    writer.flush().map_err(|e| ChurnError::persistence(path, e))?;

    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Read an artifact back. Missing, empty and undecodable files are all
/// reported as corrupt.
pub fn read_json_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| ChurnError::corrupt_artifact(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| ChurnError::corrupt_artifact(path, e))?
        .len();
    if len == 0 {
        return Err(ChurnError::corrupt_artifact(path, "file is empty"));
    }
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ChurnError::corrupt_artifact(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn round_trips_and_detects_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");

        let mut value = BTreeMap::new();
        value.insert("a".to_string(), 1.5f64);
        write_json_artifact(&path, &value).unwrap();
        let back: BTreeMap<String, f64> = read_json_artifact(&path).unwrap();
        assert_eq!(back, value);

        File::create(&path).unwrap();
        let err = read_json_artifact::<BTreeMap<String, f64>>(&path).unwrap_err();
        assert!(matches!(err, ChurnError::CorruptArtifact { .. }));
    }

    #[test]
    fn all_present_requires_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        assert!(!paths.all_present());
        assert_eq!(paths.missing().len(), 5);

        for path in paths.all() {
            fs::write(path, "{}").unwrap();
        }
        assert!(paths.all_present());

        fs::write(&paths.scaler, "").unwrap();
        assert!(!paths.all_present());
        assert_eq!(paths.missing(), vec![paths.scaler.as_path()]);
    }
}
