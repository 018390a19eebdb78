//! Inference over a restored (or freshly trained) set of artifacts.
//!
//! `ServingModels` is immutable once built. The HTTP layer wraps it in a
//! one-shot initialization guard and shares it between requests.
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ModelChoice, ModelKind, PipelineConfig};
use crate::data_handling::{round_to, CustomerTable, CUSTOMER_ID};
use crate::error::{ChurnError, Result};
use crate::evaluation::MetricsRecord;
use crate::io::artifacts::{read_json_artifact, ArtifactPaths};
use crate::models::ClassifierModel;
use crate::pipeline::{run_training_pipeline, TrainingRun};
use crate::preprocessing::{encode_with, extract_features, LabelEncoder, Scaler, N_FEATURES};
use crate::stats::accuracy;
use crate::training::TrainedModels;

/// Probabilities at or beyond these bounds are reported with high confidence.
pub const HIGH_CONFIDENCE_UPPER: f64 = 0.7;
pub const HIGH_CONFIDENCE_LOWER: f64 = 0.3;

/// Raw feature tuple of a single customer, before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub age: i64,
    pub monthly_spend: f64,
    pub tenure: i64,
    /// Code assigned to the recharge plan by the persisted encoder.
    pub recharge_type: usize,
    pub data_usage: f64,
    pub complaints: i64,
}

impl CustomerFeatures {
    /// Values in model column order.
    pub fn to_row(&self) -> [f64; N_FEATURES] {
        [
            self.age as f64,
            self.monthly_spend,
            self.tenure as f64,
            self.recharge_type as f64,
            self.data_usage,
            self.complaints as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChurnProbability {
    Estimated(f64),
    /// The model has no probability output.
    Unavailable,
}

impl ChurnProbability {
    pub fn value(&self) -> Option<f64> {
        match self {
            ChurnProbability::Estimated(p) => Some(*p),
            ChurnProbability::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
}

/// Coarse confidence of a probability; `None` when there is no estimate.
pub fn confidence_for(probability: ChurnProbability) -> Option<Confidence> {
    probability.value().map(|p| {
        if p >= HIGH_CONFIDENCE_UPPER || p <= HIGH_CONFIDENCE_LOWER {
            Confidence::High
        } else {
            Confidence::Medium
        }
    })
}

/// Reject scaled rows whose values, or squared norm, are not finite.
fn ensure_finite(scaled: &Array2<f64>) -> Result<()> {
    for row in scaled.rows() {
        let norm: f64 = row.iter().map(|v| v * v).sum();
        if !norm.is_finite() {
            return Err(ChurnError::RequestValidation(
                "feature values are out of range".to_string(),
            ));
        }
    }
    Ok(())
}

/// "Churn" or "No Churn".
pub fn label_name(label: usize) -> &'static str {
    if label == 1 {
        "Churn"
    } else {
        "No Churn"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinglePrediction {
    pub model: ModelKind,
    pub label: usize,
    pub probability: ChurnProbability,
    pub confidence: Option<Confidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowPrediction {
    pub customer_id: String,
    pub predicted: usize,
    pub probability: Option<f64>,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetEvaluation {
    pub model: ModelKind,
    pub total: usize,
    /// Rows predicted as churn.
    pub churned: usize,
    /// Percentage of rows predicted correctly, two decimals.
    pub accuracy: f64,
    pub predictions: Vec<RowPrediction>,
}

/// The artifact set the server answers requests with.
#[derive(Debug, Clone)]
pub struct ServingModels {
    models: TrainedModels,
    scaler: Scaler,
    recharge_encoder: LabelEncoder,
    metrics: MetricsRecord,
}

impl ServingModels {
    /// Read the full artifact set. Any missing, empty or undecodable file
    /// fails the whole restore.
    pub fn restore(paths: &ArtifactPaths) -> Result<Self> {
        if let Some(missing) = paths.missing().first() {
            return Err(ChurnError::corrupt_artifact(*missing, "missing or empty"));
        }
        let models = TrainedModels::restore(paths)?;
        let scaler: Scaler = read_json_artifact(&paths.scaler)?;
        scaler
            .validate()
            .map_err(|e| ChurnError::corrupt_artifact(&paths.scaler, e))?;
        let recharge_encoder = read_json_artifact(&paths.label_encoder)?;
        let metrics = MetricsRecord::restore(&paths.metrics)?;

        if scaler.n_features() != N_FEATURES
            || models.decision_tree.n_features() != N_FEATURES
            || models.knn.n_features() != N_FEATURES
        {
            return Err(ChurnError::corrupt_artifact(
                &paths.scaler,
                format!("artifacts do not describe {} features", N_FEATURES),
            ));
        }

        Ok(ServingModels {
            models,
            scaler,
            recharge_encoder,
            metrics,
        })
    }

    pub fn from_training_run(run: TrainingRun) -> Self {
        ServingModels {
            models: run.models,
            scaler: run.scaler,
            recharge_encoder: run.recharge_encoder,
            metrics: run.metrics,
        }
    }

    /// Run the pipeline, persist the artifacts and serve the fresh run.
    pub fn train_and_persist<P: AsRef<Path>>(
        data_path: P,
        config: &PipelineConfig,
        paths: &ArtifactPaths,
    ) -> Result<Self> {
        let run = run_training_pipeline(data_path, config)?;
        run.persist(paths)?;
        Ok(ServingModels::from_training_run(run))
    }

    /// Restore the persisted artifacts, or retrain from the dataset when
    /// they are incomplete or unreadable.
    pub fn load_or_train<P: AsRef<Path>>(
        data_path: P,
        config: &PipelineConfig,
        paths: &ArtifactPaths,
    ) -> Result<Self> {
        if paths.all_present() {
            match ServingModels::restore(paths) {
                Ok(serving) => {
                    log::info!("Loaded persisted models and scaler");
                    return Ok(serving);
                }
                Err(e) => log::warn!("{}; training new models", e),
            }
        } else {
            for path in paths.missing() {
                log::info!("Artifact not found: {}", path.display());
            }
            log::info!("Training models from scratch");
        }
        ServingModels::train_and_persist(data_path, config, paths)
    }

    pub fn metrics(&self) -> &MetricsRecord {
        &self.metrics
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn recharge_encoder(&self) -> &LabelEncoder {
        &self.recharge_encoder
    }

    pub fn resolve(&self, choice: ModelChoice) -> ModelKind {
        match choice {
            ModelChoice::Best => self.metrics.best_model(),
            ModelChoice::Specific(kind) => kind,
        }
    }

    pub fn model(&self, kind: ModelKind) -> &dyn ClassifierModel {
        match kind {
            ModelKind::DecisionTree => &self.models.decision_tree,
            ModelKind::Knn => &self.models.knn,
        }
    }

    /// Code of a recharge plan label under the persisted encoder.
    pub fn encode_recharge_type(&self, label: &str) -> Result<usize> {
        self.recharge_encoder
            .transform(label)
            .map_err(|_| ChurnError::RequestValidation(format!("unknown recharge type '{}'", label)))
    }

    pub fn predict_single(
        &self,
        choice: ModelChoice,
        features: &CustomerFeatures,
    ) -> Result<SinglePrediction> {
        let kind = self.resolve(choice);
        let model = self.model(kind);

        let scaled = self.scaler.transform_row(&features.to_row())?;
        ensure_finite(&scaled)?;
        log::debug!("[PREDICT] scaled features: {:?}", scaled.row(0).to_vec());

        let label = model
            .predict(&scaled)?
            .first()
            .copied()
            .ok_or_else(|| ChurnError::Inference("model returned no prediction".to_string()))?;
        let probability = match model.predict_proba(&scaled)? {
            Some(p) => p
                .first()
                .map_or(ChurnProbability::Unavailable, |&v| ChurnProbability::Estimated(v)),
            None => ChurnProbability::Unavailable,
        };

        Ok(SinglePrediction {
            model: kind,
            label,
            probability,
            confidence: confidence_for(probability),
        })
    }

    /// Predict every row of `table` and score the predictions against its
    /// churn labels.
    pub fn evaluate_dataset(
        &self,
        choice: ModelChoice,
        table: &CustomerTable,
    ) -> Result<DatasetEvaluation> {
        let kind = self.resolve(choice);
        let model = self.model(kind);

        let encoded = encode_with(table, &self.recharge_encoder)?;
        let (x, y) = extract_features(&encoded)?;
        let scaled = self.scaler.transform(&x)?;
        ensure_finite(&scaled)?;
        log::info!("[EVALUATE] {} rows with {}", scaled.nrows(), kind);

        let predicted = model.predict(&scaled)?;
        let probabilities = model.predict_proba(&scaled)?;
        let ids = table.column(CUSTOMER_ID)?;

        let predictions = (0..predicted.len())
            .map(|i| RowPrediction {
                customer_id: ids[i].to_string(),
                predicted: predicted[i],
                probability: probabilities.as_ref().map(|p| p[i]),
                actual: y[i],
            })
            .collect();

        let accuracy_pct = round_to(accuracy(&y, &predicted)? * 100.0, 2);
        log::info!("[EVALUATE] accuracy {:.2}%", accuracy_pct);

        Ok(DatasetEvaluation {
            model: kind,
            total: predicted.len(),
            churned: predicted.iter().filter(|&&p| p == 1).count(),
            accuracy: accuracy_pct,
            predictions,
        })
    }
}
