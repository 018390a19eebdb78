//! Fitting and persisting the two churn classifiers.
use ndarray::{Array1, Array2};

use crate::config::{DecisionTreeParams, KnnParams, KnnWeights, ModelConfig};
use crate::error::{ChurnError, Result};
use crate::io::artifacts::{read_json_artifact, write_json_artifact, ArtifactPaths};
use crate::models::{DecisionTreeClassifier, KnnClassifier};

pub fn train_decision_tree(
    x_train: &Array2<f64>,
    y_train: &Array1<usize>,
    params: &DecisionTreeParams,
) -> Result<DecisionTreeClassifier> {
    log::info!(
        "Training decision tree (max_depth={}, min_samples_split={}, min_samples_leaf={}, criterion={:?})",
        params.max_depth,
        params.min_samples_split,
        params.min_samples_leaf,
        params.criterion
    );
    let tree = DecisionTreeClassifier::fit(x_train, y_train, params)?;
    log::info!(
        "Decision tree trained: depth {}, {} leaves",
        tree.depth(),
        tree.n_leaves()
    );
    Ok(tree)
}

pub fn train_knn(
    x_train: &Array2<f64>,
    y_train: &Array1<usize>,
    params: &KnnParams,
) -> Result<KnnClassifier> {
    let weights = match params.weights {
        KnnWeights::Uniform => "uniform",
        KnnWeights::Distance => "distance",
    };
    let knn = KnnClassifier::fit(x_train, y_train, params)?;
    log::info!(
        "KNN trained: k={}, metric=euclidean, weights={}, {} reference rows",
        params.n_neighbors,
        weights,
        knn.n_samples()
    );
    Ok(knn)
}

/// Both fitted classifiers of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModels {
    pub decision_tree: DecisionTreeClassifier,
    pub knn: KnnClassifier,
}

impl TrainedModels {
    pub fn train(
        x_train: &Array2<f64>,
        y_train: &Array1<usize>,
        config: &ModelConfig,
    ) -> Result<Self> {
        Ok(TrainedModels {
            decision_tree: train_decision_tree(x_train, y_train, &config.decision_tree)?,
            knn: train_knn(x_train, y_train, &config.knn)?,
        })
    }

    /// Write both models, replacing earlier files. Write failures are
    /// returned to the caller as they happen.
    pub fn persist(&self, paths: &ArtifactPaths) -> Result<()> {
        write_json_artifact(&paths.decision_tree, &self.decision_tree)?;
        write_json_artifact(&paths.knn, &self.knn)?;
        log::info!(
            "Models saved to {} and {}",
            paths.decision_tree.display(),
            paths.knn.display()
        );
        Ok(())
    }

    /// Read both models back. A file that decodes but does not describe a
    /// usable model is reported as corrupt.
    pub fn restore(paths: &ArtifactPaths) -> Result<Self> {
        let decision_tree: DecisionTreeClassifier = read_json_artifact(&paths.decision_tree)?;
        decision_tree
            .validate()
            .map_err(|e| ChurnError::corrupt_artifact(&paths.decision_tree, e))?;
        let knn: KnnClassifier = read_json_artifact(&paths.knn)?;
        knn.validate()
            .map_err(|e| ChurnError::corrupt_artifact(&paths.knn, e))?;
        Ok(TrainedModels { decision_tree, knn })
    }
}
