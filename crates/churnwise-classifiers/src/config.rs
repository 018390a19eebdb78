use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Impurity measure used to score decision tree splits.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    Gini,
    Entropy,
}

/// Voting scheme for the k-nearest-neighbours classifier.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KnnWeights {
    Uniform,
    Distance,
}

/// Decision tree hyper-parameters. The tree always searches every
/// threshold of every feature for the best split.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DecisionTreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub criterion: SplitCriterion,
    pub random_state: u64,
}

impl Default for DecisionTreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_split: 3,
            min_samples_leaf: 2,
            criterion: SplitCriterion::Gini,
            random_state: 42,
        }
    }
}

/// k-nearest-neighbours hyper-parameters. Distances are Euclidean.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub weights: KnnWeights,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: KnnWeights::Distance,
        }
    }
}

/// Hyper-parameters for both models trained by the pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub decision_tree: DecisionTreeParams,
    pub knn: KnnParams,
}

/// Central configuration for a training run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    /// Seed for the stratified split.
    pub random_state: u64,
    pub models: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            random_state: 42,
            models: ModelConfig::default(),
        }
    }
}

/// The two classifiers served by the application.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    DecisionTree,
    Knn,
}

impl ModelKind {
    /// Identifier used in requests and artifact keys.
    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::Knn => "knn",
        }
    }

    /// Human readable name used in responses and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::Knn => "KNN",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "decision_tree" | "decision tree" | "tree" => Ok(ModelKind::DecisionTree),
            "knn" => Ok(ModelKind::Knn),
            _ => Err(format!(
                "Unknown model type: {}. Expected one of: best, decision_tree, knn",
                s
            )),
        }
    }
}

/// Model requested by a client: a specific kind, or whichever scored best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Best,
    Specific(ModelKind),
}

impl Default for ModelChoice {
    fn default() -> Self {
        ModelChoice::Best
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("best") {
            return Ok(ModelChoice::Best);
        }
        s.parse::<ModelKind>().map(ModelChoice::Specific)
    }
}
