//! k-nearest-neighbours classifier backed by a linfa-nn linear search index.
use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::{KnnParams, KnnWeights};
use crate::error::{ChurnError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Lazy learner: fitting stores the (scaled) training rows, and queries
/// vote among the `n_neighbors` closest of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnnClassifier {
    params: KnnParams,
    points: Array2<f64>,
    labels: Array1<usize>,
    n_classes: usize,
}

impl KnnClassifier {
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, params: &KnnParams) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(ChurnError::InsufficientData(format!(
                "feature matrix has {} rows but {} labels were given",
                x.nrows(),
                y.len()
            )));
        }
        if params.n_neighbors == 0 {
            return Err(ChurnError::InsufficientData(
                "n_neighbors must be at least 1".to_string(),
            ));
        }
        if params.n_neighbors > x.nrows() {
            return Err(ChurnError::InsufficientData(format!(
                "n_neighbors = {} but only {} training rows are available",
                params.n_neighbors,
                x.nrows()
            )));
        }

        let n_classes = y.iter().copied().max().map_or(2, |m| (m + 1).max(2));
        Ok(KnnClassifier {
            params: params.clone(),
            points: x.clone(),
            labels: y.clone(),
            n_classes,
        })
    }

    pub fn params(&self) -> &KnnParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.points.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.points.nrows()
    }

    /// Check that a deserialized model can answer queries.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ChurnError::Inference(format!("invalid knn model: {}", msg)));
        if self.labels.len() != self.points.nrows() {
            return invalid(format!(
                "{} stored rows but {} labels",
                self.points.nrows(),
                self.labels.len()
            ));
        }
        if self.params.n_neighbors == 0 || self.params.n_neighbors > self.points.nrows() {
            return invalid(format!(
                "n_neighbors = {} with {} stored rows",
                self.params.n_neighbors,
                self.points.nrows()
            ));
        }
        if let Some(label) = self.labels.iter().find(|&&l| l >= self.n_classes) {
            return invalid(format!("label {} outside {} classes", label, self.n_classes));
        }
        if self.points.iter().any(|v| !v.is_finite()) {
            return invalid("stored rows contain non-finite values".to_string());
        }
        Ok(())
    }

    /// Per-class vote weights for every query row.
    fn votes(&self, x: &Array2<f64>) -> Result<Vec<Vec<f64>>> {
        if x.ncols() != self.points.ncols() {
            return Err(ChurnError::Inference(format!(
                "knn expects {} features, got {}",
                self.points.ncols(),
                x.ncols()
            )));
        }

        let index = CommonNearestNeighbour::LinearSearch
            .from_batch(&self.points, L2Dist)
            .map_err(|e| ChurnError::Inference(format!("failed to build knn index: {}", e)))?;

        x.rows()
            .into_iter()
            .map(|query| {
                // The index panics on infinite distances, so refuse such queries up front.
                if self
                    .points
                    .rows()
                    .into_iter()
                    .any(|p| !L2Dist.rdistance(query, p).is_finite())
                {
                    return Err(ChurnError::RequestValidation(
                        "features are too large to compare with the training rows".to_string(),
                    ));
                }
                let neighbours = index
                    .k_nearest(query, self.params.n_neighbors)
                    .map_err(|e| ChurnError::Inference(format!("knn query failed: {}", e)))?;
                Ok(self.tally(query, &neighbours))
            })
            .collect()
    }

    fn tally(&self, query: ArrayView1<f64>, neighbours: &[(ArrayView1<f64>, usize)]) -> Vec<f64> {
        let mut votes = vec![0.0; self.n_classes];
        match self.params.weights {
            KnnWeights::Uniform => {
                for (_, idx) in neighbours {
                    votes[self.labels[*idx]] += 1.0;
                }
            }
            KnnWeights::Distance => {
                let distances: Vec<(f64, usize)> = neighbours
                    .iter()
                    .map(|(point, idx)| (L2Dist.distance(query, point.view()), *idx))
                    .collect();

                // A neighbour sitting exactly on the query takes all the weight.
                let exact: Vec<usize> = distances
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|(_, idx)| *idx)
                    .collect();
                if exact.is_empty() {
                    for (d, idx) in distances {
                        votes[self.labels[idx]] += 1.0 / d;
                    }
                } else {
                    for idx in exact {
                        votes[self.labels[idx]] += 1.0;
                    }
                }
            }
        }
        votes
    }
}

impl ClassifierModel for KnnClassifier {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        Ok(self
            .votes(x)?
            .iter()
            .map(|votes| {
                let mut best = 0;
                for (class, &w) in votes.iter().enumerate() {
                    if w > votes[best] {
                        best = class;
                    }
                }
                best
            })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>> {
        let proba = self
            .votes(x)?
            .iter()
            .map(|votes| {
                let total: f64 = votes.iter().sum();
                if total > 0.0 {
                    votes.get(1).copied().unwrap_or(0.0) / total
                } else {
                    0.0
                }
            })
            .collect();
        Ok(Some(proba))
    }

    fn name(&self) -> &str {
        "KNN"
    }
}
