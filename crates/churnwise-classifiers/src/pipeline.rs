//! The end-to-end training run: load, encode, split, scale, fit, score.
use std::path::Path;

use crate::config::PipelineConfig;
use crate::data_handling::load_customers;
use crate::error::Result;
use crate::evaluation::{evaluate_model, MetricsRecord};
use crate::io::artifacts::{write_json_artifact, ArtifactPaths};
use crate::preprocessing::{
    encode, extract_features, fit_scaler, train_test_split, LabelEncoder, Scaler,
};
use crate::training::TrainedModels;

/// Everything a training run produces. Persisted together and restored
/// together.
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub models: TrainedModels,
    pub scaler: Scaler,
    pub recharge_encoder: LabelEncoder,
    pub metrics: MetricsRecord,
}

pub fn run_training_pipeline<P: AsRef<Path>>(
    data_path: P,
    config: &PipelineConfig,
) -> Result<TrainingRun> {
    let table = load_customers(data_path)?;
    table.log_input_data_summary();

    let encoded = encode(&table)?;
    let (x, y) = extract_features(&encoded)?;
    let split = train_test_split(&x, &y, config.test_size, config.random_state)?;

    let scaler = fit_scaler(&split.x_train)?;
    let x_train = scaler.transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;

    let models = TrainedModels::train(&x_train, &split.y_train, &config.models)?;

    let (dt_metrics, _) = evaluate_model(
        &models.decision_tree,
        &x_test,
        &split.y_test,
        "Decision Tree",
    )?;
    let (knn_metrics, _) = evaluate_model(&models.knn, &x_test, &split.y_test, "KNN")?;
    let metrics = MetricsRecord::new(dt_metrics, knn_metrics);

    Ok(TrainingRun {
        models,
        scaler,
        recharge_encoder: encoded.recharge_encoder,
        metrics,
    })
}

impl TrainingRun {
    /// Write all five artifacts, overwriting any previous run.
    pub fn persist(&self, paths: &ArtifactPaths) -> Result<()> {
        self.models.persist(paths)?;
        write_json_artifact(&paths.scaler, &self.scaler)?;
        write_json_artifact(&paths.label_encoder, &self.recharge_encoder)?;
        self.metrics.persist(&paths.metrics)?;
        log::info!("Scaler saved to {}", paths.scaler.display());
        Ok(())
    }
}
