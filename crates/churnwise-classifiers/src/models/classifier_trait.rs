use ndarray::{Array1, Array2};

use crate::error::Result;

/// Contract shared by the churn classifiers. Labels follow the crate
/// convention of 1 for churn and 0 for retained customers.
pub trait ClassifierModel: Send + Sync {
    /// Predict a class label per row.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>>;

    /// Probability of the positive (churn) class per row, or `None` when
    /// the model cannot estimate probabilities.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array1<f64>>>;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
