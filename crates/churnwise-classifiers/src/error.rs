use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Failures raised by the preprocessing, training, evaluation and serving steps.
#[derive(Debug)]
pub enum ChurnError {
    /// The dataset is missing, unreadable or malformed.
    DataLoad(String),
    /// An expected column is absent.
    Schema(String),
    /// Too few rows (or members of a class) for the requested operation.
    InsufficientData(String),
    /// An artifact could not be written.
    Persistence { path: PathBuf, reason: String },
    /// An artifact could not be read back.
    CorruptArtifact { path: PathBuf, reason: String },
    /// A prediction request carried malformed input.
    RequestValidation(String),
    /// A fitted model or scaler was applied to incompatible input.
    Inference(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChurnError>;

impl ChurnError {
    pub fn persistence(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ChurnError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn corrupt_artifact(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        ChurnError::CorruptArtifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ChurnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChurnError::DataLoad(msg) => write!(f, "Failed to load dataset: {}", msg),
            ChurnError::Schema(msg) => write!(f, "Schema error: {}", msg),
            ChurnError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            ChurnError::Persistence { path, reason } => {
                write!(f, "Failed to write artifact {}: {}", path.display(), reason)
            }
            ChurnError::CorruptArtifact { path, reason } => {
                write!(f, "Failed to read artifact {}: {}", path.display(), reason)
            }
            ChurnError::RequestValidation(msg) => write!(f, "Invalid request: {}", msg),
            ChurnError::Inference(msg) => write!(f, "Inference failed: {}", msg),
        }
    }
}

impl Error for ChurnError {}
