//! Application configuration for the churnwise binary.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use churnwise_classifiers::config::PipelineConfig;
use churnwise_classifiers::io::ArtifactPaths;

/// Paths, bind address and training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub model_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/raw/customer_data.csv"),
            model_dir: PathBuf::from("models"),
            host: "0.0.0.0".to_string(),
            port: 5000,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build the configuration of a subcommand: the optional JSON file
    /// first, then any command line overrides.
    pub fn from_arguments(matches: &ArgMatches) -> Result<Self> {
        let mut config = match matches.get_one::<PathBuf>("config") {
            Some(path) => load_app_config(path)?,
            None => AppConfig::default(),
        };

        if let Some(data) = matches.get_one::<PathBuf>("data") {
            config.data_path = data.clone();
        }
        if let Some(dir) = matches.get_one::<PathBuf>("model_dir") {
            config.model_dir = dir.clone();
        }
        if let Ok(Some(host)) = matches.try_get_one::<String>("host") {
            config.host = host.clone();
        }
        if let Ok(Some(port)) = matches.try_get_one::<u16>("port") {
            config.port = *port;
        }

        Ok(config)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.model_dir)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load an application configuration from a JSON file.
pub fn load_app_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

pub fn validate_tsv_or_csv_file(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path.display()),
    }

    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }

    Ok(())
}
