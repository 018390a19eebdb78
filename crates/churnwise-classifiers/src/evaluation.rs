//! Held-out evaluation of the fitted models and the comparison that picks
//! the model served as "best".
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::ModelKind;
use crate::error::Result;
use crate::io::artifacts::{read_json_artifact, write_json_artifact};
use crate::models::ClassifierModel;
use crate::stats::ConfusionMatrix;

/// Scores of one model on the test partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model_name: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[usize; 2]; 2],
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ModelMetrics {
    pub fn from_confusion_matrix(model_name: &str, cm: &ConfusionMatrix) -> Self {
        ModelMetrics {
            model_name: model_name.to_string(),
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            confusion_matrix: cm.as_matrix(),
            true_negatives: cm.true_negatives,
            false_positives: cm.false_positives,
            false_negatives: cm.false_negatives,
            true_positives: cm.true_positives,
        }
    }

    /// Mean of accuracy and F1, the score used to rank models.
    pub fn accuracy_f1_average(&self) -> f64 {
        (self.accuracy + self.f1_score) / 2.0
    }

    pub fn log_summary(&self) {
        log::info!(
            "{}: accuracy {:.4}, precision {:.4}, recall {:.4}, f1 {:.4}",
            self.model_name,
            self.accuracy,
            self.precision,
            self.recall,
            self.f1_score
        );
        log::info!(
            "{}: confusion matrix tn={} fp={} fn={} tp={}",
            self.model_name,
            self.true_negatives,
            self.false_positives,
            self.false_negatives,
            self.true_positives
        );
    }
}

/// Run `model` on the test partition and score its predictions.
pub fn evaluate_model(
    model: &dyn ClassifierModel,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
    model_name: &str,
) -> Result<(ModelMetrics, Array1<usize>)> {
    let predictions = model.predict(x_test)?;
    let cm = ConfusionMatrix::from_predictions(y_test, &predictions)?;
    let metrics = ModelMetrics::from_confusion_matrix(model_name, &cm);
    metrics.log_summary();
    Ok((metrics, predictions))
}

/// Which side won a single metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWinner {
    pub metric: String,
    pub decision_tree: f64,
    pub knn: f64,
    pub winner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub decision_tree_avg: f64,
    pub knn_avg: f64,
    pub recommended_model: String,
    #[serde(default)]
    pub per_metric: Vec<MetricWinner>,
}

/// Compare the decision tree against kNN. Ties go to the decision tree,
/// both per metric and in the overall recommendation.
pub fn compare_models(decision_tree: &ModelMetrics, knn: &ModelMetrics) -> ModelComparison {
    let pairs = [
        ("accuracy", decision_tree.accuracy, knn.accuracy),
        ("precision", decision_tree.precision, knn.precision),
        ("recall", decision_tree.recall, knn.recall),
        ("f1_score", decision_tree.f1_score, knn.f1_score),
    ];

    let per_metric = pairs
        .iter()
        .map(|&(metric, dt, kn)| {
            let winner = if dt >= kn {
                ModelKind::DecisionTree
            } else {
                ModelKind::Knn
            };
            log::info!("{:<10} tree {:.4}  knn {:.4}  -> {}", metric, dt, kn, winner);
            MetricWinner {
                metric: metric.to_string(),
                decision_tree: dt,
                knn: kn,
                winner: winner.display_name().to_string(),
            }
        })
        .collect();

    let decision_tree_avg = decision_tree.accuracy_f1_average();
    let knn_avg = knn.accuracy_f1_average();
    let recommended = if knn_avg > decision_tree_avg {
        ModelKind::Knn
    } else {
        ModelKind::DecisionTree
    };
    log::info!(
        "Recommended model: {} (tree avg {:.4}, knn avg {:.4})",
        recommended,
        decision_tree_avg,
        knn_avg
    );

    ModelComparison {
        decision_tree_avg,
        knn_avg,
        recommended_model: recommended.display_name().to_string(),
        per_metric,
    }
}

/// The persisted outcome of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub decision_tree: ModelMetrics,
    pub knn: ModelMetrics,
    pub comparison: ModelComparison,
    #[serde(default)]
    pub trained_at: Option<String>,
}

impl MetricsRecord {
    pub fn new(decision_tree: ModelMetrics, knn: ModelMetrics) -> Self {
        let comparison = compare_models(&decision_tree, &knn);
        MetricsRecord {
            decision_tree,
            knn,
            comparison,
            trained_at: Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }

    pub fn metrics_for(&self, kind: ModelKind) -> &ModelMetrics {
        match kind {
            ModelKind::DecisionTree => &self.decision_tree,
            ModelKind::Knn => &self.knn,
        }
    }

    /// Model served when a client asks for "best": the higher
    /// accuracy/F1 average, the decision tree on ties.
    pub fn best_model(&self) -> ModelKind {
        if self.decision_tree.accuracy_f1_average() >= self.knn.accuracy_f1_average() {
            ModelKind::DecisionTree
        } else {
            ModelKind::Knn
        }
    }

    /// Overwrite the record at `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_json_artifact(path, self)?;
        log::info!("Metrics saved to {}", path.display());
        Ok(())
    }

    pub fn restore(path: &Path) -> Result<Self> {
        read_json_artifact(path)
    }
}
