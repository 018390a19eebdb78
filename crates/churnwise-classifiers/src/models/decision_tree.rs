//! CART decision tree classifier.
//!
//! Nodes live in a flat arena so a fitted tree serializes as plain data.
//! Every internal node routes rows with `x[feature] <= threshold` to the
//! left child; leaves keep the class counts of the training rows that
//! reached them, which double as probability estimates.
use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{DecisionTreeParams, SplitCriterion};
use crate::error::{ChurnError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Two feature values closer than this are treated as equal.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        class_counts: Vec<usize>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        class_counts: Vec<usize>,
    },
}

impl TreeNode {
    pub fn class_counts(&self) -> &[usize] {
        match self {
            TreeNode::Leaf { class_counts } | TreeNode::Split { class_counts, .. } => class_counts,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    params: DecisionTreeParams,
    n_features: usize,
    n_classes: usize,
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<usize>,
    criterion: SplitCriterion,
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    n_classes: usize,
    feature_order: Vec<usize>,
    nodes: Vec<TreeNode>,
}

impl DecisionTreeClassifier {
    /// Grow a tree on `x` (rows are samples) and class labels `y`.
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, params: &DecisionTreeParams) -> Result<Self> {
        let (nrows, n_features) = x.dim();
        if nrows != y.len() {
            return Err(ChurnError::InsufficientData(format!(
                "feature matrix has {} rows but {} labels were given",
                nrows,
                y.len()
            )));
        }
        if nrows == 0 || n_features == 0 {
            return Err(ChurnError::InsufficientData(
                "cannot fit a decision tree on an empty matrix".to_string(),
            ));
        }

        let n_classes = y.iter().copied().max().map_or(2, |m| (m + 1).max(2));

        // Candidate features are visited in a seeded order; among equally good
        // splits the first one visited wins.
        let mut feature_order: Vec<usize> = (0..n_features).collect();
        feature_order.shuffle(&mut StdRng::seed_from_u64(params.random_state));

        let mut builder = TreeBuilder {
            x,
            y,
            criterion: params.criterion,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            min_samples_leaf: params.min_samples_leaf.max(1),
            n_classes,
            feature_order,
            nodes: Vec::new(),
        };
        builder.build((0..nrows).collect(), 0);

        Ok(DecisionTreeClassifier {
            params: params.clone(),
            n_features,
            n_classes,
            nodes: builder.nodes,
        })
    }

    pub fn params(&self) -> &DecisionTreeParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Check the structure of a deserialized tree. Children must come after
    /// their parent in the arena, which also rules out cycles.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ChurnError::Inference(format!("invalid decision tree: {}", msg)));
        if self.nodes.is_empty() {
            return invalid("no nodes".to_string());
        }
        if self.n_classes < 2 {
            return invalid(format!("{} classes", self.n_classes));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.class_counts().len() != self.n_classes {
                return invalid(format!(
                    "node {} has {} class counts, expected {}",
                    idx,
                    node.class_counts().len(),
                    self.n_classes
                ));
            }
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return invalid(format!("node {} splits on feature {}", idx, feature));
                }
                if !threshold.is_finite() {
                    return invalid(format!("node {} has a non-finite threshold", idx));
                }
                for &child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return invalid(format!("node {} points at child {}", idx, child));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_counts(&self, row: ArrayView1<f64>) -> &[usize] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { class_counts } => return class_counts,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.n_features {
            return Err(ChurnError::Inference(format!(
                "decision tree expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        if self.nodes.is_empty() {
            return Err(ChurnError::Inference("decision tree has no nodes".to_string()));
        }
        Ok(())
    }
}

impl ClassifierModel for DecisionTreeClassifier {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        self.check_width(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| argmax(self.leaf_counts(row)))
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>> {
        self.check_width(x)?;
        let proba = x
            .rows()
            .into_iter()
            .map(|row| {
                let counts = self.leaf_counts(row);
                let total: usize = counts.iter().sum();
                if total == 0 {
                    0.0
                } else {
                    counts.get(1).copied().unwrap_or(0) as f64 / total as f64
                }
            })
            .collect();
        Ok(Some(proba))
    }

    fn name(&self) -> &str {
        "Decision Tree"
    }
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&rows);
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            class_counts: counts.clone(),
        });

        let n = rows.len();
        let is_leaf = depth >= self.max_depth
            || n < self.min_samples_split
            || n < 2 * self.min_samples_leaf
            || impurity(&counts, self.criterion) <= f64::EPSILON;
        if is_leaf {
            return idx;
        }

        let Some(split) = self.best_split(&rows, &counts) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, split.feature]] <= split.threshold);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);

        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            class_counts: counts,
        };
        idx
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.y[r]] += 1;
        }
        counts
    }

    fn best_split(&self, rows: &[usize], parent_counts: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let mut best: Option<SplitCandidate> = None;

        for &feature in &self.feature_order {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| {
                self.x[[a, feature]]
                    .partial_cmp(&self.x[[b, feature]])
                    .unwrap_or(Ordering::Equal)
            });

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = parent_counts.to_vec();

            // `pos` rows sit on the left of the candidate threshold.
            for pos in 1..n {
                let moved = self.y[sorted[pos - 1]];
                left_counts[moved] += 1;
                right_counts[moved] -= 1;

                if pos < self.min_samples_leaf || n - pos < self.min_samples_leaf {
                    continue;
                }
                let lo = self.x[[sorted[pos - 1], feature]];
                let hi = self.x[[sorted[pos], feature]];
                if hi <= lo + FEATURE_THRESHOLD {
                    continue;
                }

                let weighted = (pos as f64 * impurity(&left_counts, self.criterion)
                    + (n - pos) as f64 * impurity(&right_counts, self.criterion))
                    / n as f64;

                if best.as_ref().map_or(true, |b| weighted < b.impurity) {
                    let mut threshold = lo / 2.0 + hi / 2.0;
                    if threshold >= hi || !threshold.is_finite() {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        impurity: weighted,
                    });
                }
            }
        }
        best
    }
}

fn impurity(counts: &[usize], criterion: SplitCriterion) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    match criterion {
        SplitCriterion::Gini => {
            1.0 - counts
                .iter()
                .map(|&c| {
                    let p = c as f64 / total;
                    p * p
                })
                .sum::<f64>()
        }
        SplitCriterion::Entropy => counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                -p * p.log2()
            })
            .sum(),
    }
}

/// Index of the largest count; ties resolve to the lowest class.
fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<usize>) {
        let x = array![
            [0.1, 5.0],
            [0.2, 4.0],
            [0.3, 5.5],
            [0.9, 4.2],
            [1.0, 5.1],
            [1.1, 4.8],
        ];
        let y = array![0, 0, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn learns_a_single_threshold() {
        let (x, y) = separable();
        let tree = DecisionTreeClassifier::fit(&x, &y, &DecisionTreeParams::default()).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(&x).unwrap(), y);
        match &tree.nodes()[0] {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 0.6).abs() < 1e-9);
            }
            TreeNode::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn probabilities_come_from_leaf_counts() {
        let x = array![[0.0], [0.0], [0.0], [1.0], [1.0], [1.0]];
        let y = array![0, 0, 1, 1, 1, 0];
        let params = DecisionTreeParams {
            max_depth: 0,
            ..DecisionTreeParams::default()
        };
        let tree = DecisionTreeClassifier::fit(&x, &y, &params).unwrap();
        let proba = tree.predict_proba(&x).unwrap().unwrap();
        assert!(proba.iter().all(|&p| (p - 0.5).abs() < 1e-12));
        // Ties go to the first class.
        assert!(tree.predict(&x).unwrap().iter().all(|&c| c == 0));
    }

    #[test]
    fn min_samples_leaf_blocks_small_children() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1, 0, 0, 0];
        let params = DecisionTreeParams {
            min_samples_leaf: 2,
            ..DecisionTreeParams::default()
        };
        let tree = DecisionTreeClassifier::fit(&x, &y, &params).unwrap();
        for node in tree.nodes().iter().filter(|n| n.is_leaf()) {
            assert!(node.class_counts().iter().sum::<usize>() >= 2);
        }
    }

    #[test]
    fn rejects_wrong_width() {
        let (x, y) = separable();
        let tree = DecisionTreeClassifier::fit(&x, &y, &DecisionTreeParams::default()).unwrap();
        let narrow = array![[0.5]];
        assert!(matches!(tree.predict(&narrow), Err(ChurnError::Inference(_))));
    }

    #[test]
    fn validate_catches_broken_links() {
        let (x, y) = separable();
        let tree = DecisionTreeClassifier::fit(&x, &y, &DecisionTreeParams::default()).unwrap();
        tree.validate().unwrap();

        let relink = |new_left: usize, new_feature: usize| {
            let mut broken = tree.clone();
            if let TreeNode::Split { left, feature, .. } = &mut broken.nodes[0] {
                *left = new_left;
                *feature = new_feature;
            }
            broken
        };
        // out of range, self loop, unknown feature
        assert!(relink(999, 0).validate().is_err());
        assert!(relink(0, 0).validate().is_err());
        assert!(relink(1, 7).validate().is_err());

        let mut short_counts = tree.clone();
        short_counts.nodes[1] = TreeNode::Leaf {
            class_counts: vec![3],
        };
        assert!(short_counts.validate().is_err());
    }
}
