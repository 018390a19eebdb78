use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Binary confusion matrix with class 1 (churn) as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against the true labels. Any label other than 1
    /// counts as negative.
    pub fn from_predictions(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ChurnError::Inference(format!(
                "{} labels but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let mut cm = ConfusionMatrix::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred.iter()) {
            match (actual == 1, predicted == 1) {
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_positives += 1,
                (true, false) => cm.false_negatives += 1,
                (true, true) => cm.true_positives += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_matrix(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn accuracy(&self) -> f64 {
        safe_ratio(self.true_negatives + self.true_positives, self.total())
    }

    pub fn precision(&self) -> f64 {
        safe_ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        safe_ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Fraction of predictions equal to the true label.
pub fn accuracy(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<f64> {
    Ok(ConfusionMatrix::from_predictions(y_true, y_pred)?.accuracy())
}

fn safe_ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
