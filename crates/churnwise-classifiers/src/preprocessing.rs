//! Feature preparation shared by training and serving.
//!
//! Provides the recharge-plan `LabelEncoder`, churn label encoding, feature
//! extraction in the fixed model column order, a stratified train/test split
//! and a simple `Scaler` for mean/std standardization. The scaler is fitted
//! once on the training partition and reused unchanged for every later
//! transform, including single-record inference.
use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data_handling::{
    CustomerTable, AGE, CHURN, CHURN_POSITIVE, COMPLAINTS, DATA_USAGE, MONTHLY_SPEND,
    RECHARGE_TYPE, TENURE,
};
use crate::error::{ChurnError, Result};

/// Column appended by `encode` holding the recharge plan code.
pub const RECHARGE_TYPE_ENCODED: &str = "Recharge_Type_Encoded";
/// Column appended by `encode` holding the 0/1 churn label.
pub const CHURN_ENCODED: &str = "Churn_Encoded";

/// Model input columns, in the order every feature vector must follow.
pub const FEATURE_COLUMNS: [&str; 6] = [
    AGE,
    MONTHLY_SPEND,
    TENURE,
    RECHARGE_TYPE_ENCODED,
    DATA_USAGE,
    COMPLAINTS,
];

pub const N_FEATURES: usize = FEATURE_COLUMNS.len();

/// Maps each recharge plan label to a stable index. Classes are sorted,
/// so the code of a label only depends on the set of labels seen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = values.into_iter().collect();
        LabelEncoder {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn transform(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map_err(|_| ChurnError::Schema(format!("unknown category '{}'", value)))
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// A table with the encoded recharge plan and churn columns appended.
#[derive(Clone, Debug)]
pub struct EncodedTable {
    pub table: CustomerTable,
    pub recharge_codes: Vec<usize>,
    pub churn: Vec<usize>,
    pub recharge_encoder: LabelEncoder,
}

/// Churn label rule: "Yes" is a churner, anything else is not.
pub fn encode_churn(value: &str) -> usize {
    usize::from(value == CHURN_POSITIVE)
}

/// Fit the recharge plan encoder on the whole table and encode it.
pub fn encode(table: &CustomerTable) -> Result<EncodedTable> {
    let encoder = LabelEncoder::fit(table.column(RECHARGE_TYPE)?);
    for (code, label) in encoder.classes().iter().enumerate() {
        log::info!("Recharge type encoding: {} -> {}", label, code);
    }
    encode_with(table, &encoder)
}

/// Encode a table with an already fitted recharge plan encoder.
pub fn encode_with(table: &CustomerTable, encoder: &LabelEncoder) -> Result<EncodedTable> {
    let recharge_codes = table
        .column(RECHARGE_TYPE)?
        .into_iter()
        .map(|value| encoder.transform(value))
        .collect::<Result<Vec<_>>>()?;
    let churn = table
        .column(CHURN)?
        .into_iter()
        .map(encode_churn)
        .collect::<Vec<_>>();

    let encoded = table
        .with_column(
            RECHARGE_TYPE_ENCODED,
            recharge_codes.iter().map(usize::to_string).collect(),
        )?
        .with_column(CHURN_ENCODED, churn.iter().map(usize::to_string).collect())?;

    Ok(EncodedTable {
        table: encoded,
        recharge_codes,
        churn,
        recharge_encoder: encoder.clone(),
    })
}

/// Select the model columns (in `FEATURE_COLUMNS` order) and the churn label.
pub fn extract_features(encoded: &EncodedTable) -> Result<(Array2<f64>, Array1<usize>)> {
    let columns = FEATURE_COLUMNS
        .iter()
        .map(|name| encoded.table.numeric_column(name))
        .collect::<Result<Vec<_>>>()?;

    let nrows = encoded.table.nrows();
    let x = Array2::from_shape_fn((nrows, N_FEATURES), |(r, c)| columns[c][r]);
    let y = Array1::from_vec(encoded.churn.clone());

    log::info!("Feature matrix shape: ({}, {})", x.nrows(), x.ncols());
    log::info!("Features used: {}", FEATURE_COLUMNS.join(", "));
    Ok((x, y))
}

/// Train and test partitions together with the source row indices.
#[derive(Clone, Debug)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Split rows into train/test partitions, preserving class proportions.
///
/// The test partition holds `ceil(test_size * n)` rows. Each class receives
/// its proportional share of test rows (largest remainder first) while
/// keeping at least one training row, and the rows of each class are drawn
/// after a shuffle seeded with `seed`.
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<usize>,
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    let n = y.len();
    if x.nrows() != n {
        return Err(ChurnError::InsufficientData(format!(
            "feature matrix has {} rows but {} labels were given",
            x.nrows(),
            n
        )));
    }
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ChurnError::InsufficientData(format!(
            "test_size must lie in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(ChurnError::InsufficientData(format!(
            "cannot split {} rows with test_size {}",
            n, test_size
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    if let Some((label, rows)) = by_class.iter().find(|(_, rows)| rows.len() < 2) {
        return Err(ChurnError::InsufficientData(format!(
            "class {} has only {} member(s); at least 2 are needed to stratify",
            label,
            rows.len()
        )));
    }
    let n_classes = by_class.len();
    if n_test < n_classes || n_train < n_classes {
        return Err(ChurnError::InsufficientData(format!(
            "{} classes do not fit in a split of {} train / {} test rows",
            n_classes, n_train, n_test
        )));
    }

    let test_counts = apportion_test_rows(&by_class, n, n_test);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(n_train);
    let mut test_indices = Vec::with_capacity(n_test);
    for ((_, rows), &take) in by_class.iter().zip(test_counts.iter()) {
        let mut rows = rows.clone();
        rows.shuffle(&mut rng);
        test_indices.extend_from_slice(&rows[..take]);
        train_indices.extend_from_slice(&rows[take..]);
    }
    train_indices.sort_unstable();
    test_indices.sort_unstable();

    let split = TrainTestSplit {
        x_train: x.select(Axis(0), &train_indices),
        x_test: x.select(Axis(0), &test_indices),
        y_train: y.select(Axis(0), &train_indices),
        y_test: y.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    };

    log::info!("Training set: {} rows", split.y_train.len());
    log::info!("Testing set: {} rows", split.y_test.len());
    log::info!("Train churn rate: {:.2}%", positive_rate(&split.y_train) * 100.0);
    log::info!("Test churn rate: {:.2}%", positive_rate(&split.y_test) * 100.0);

    Ok(split)
}

fn apportion_test_rows(by_class: &BTreeMap<usize, Vec<usize>>, n: usize, n_test: usize) -> Vec<usize> {
    let shares: Vec<f64> = by_class
        .values()
        .map(|rows| rows.len() as f64 * n_test as f64 / n as f64)
        .collect();
    let capacity: Vec<usize> = by_class.values().map(|rows| rows.len() - 1).collect();
    let mut counts: Vec<usize> = shares
        .iter()
        .zip(&capacity)
        .map(|(share, &cap)| (share.floor() as usize).min(cap))
        .collect();

    // Remaining rows go to the largest fractional parts; ties favour the lower class.
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = shares[a] - shares[a].floor();
        let fb = shares[b] - shares[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(counts.iter().sum());
    while remaining > 0 {
        let before = remaining;
        for &c in &order {
            if remaining == 0 {
                break;
            }
            if counts[c] < capacity[c] {
                counts[c] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            break;
        }
    }
    counts
}

fn positive_rate(y: &Array1<usize>) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().filter(|&&v| v == 1).count() as f64 / y.len() as f64
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Below this a feature is treated as constant and left unscaled.
    const MIN_STD: f64 = 1e-12;

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Check that a deserialized scaler has one usable divisor per mean.
    pub fn validate(&self) -> Result<()> {
        if self.std.len() != self.mean.len() {
            return Err(ChurnError::Inference(format!(
                "scaler has {} means but {} deviations",
                self.mean.len(),
                self.std.len()
            )));
        }
        let finite_means = self.mean.iter().all(|m| m.is_finite());
        let usable_stds = self.std.iter().all(|s| s.is_finite() && *s > 0.0);
        if !finite_means || !usable_stds {
            return Err(ChurnError::Inference(
                "scaler coefficients must be finite with positive deviations".to_string(),
            ));
        }
        Ok(())
    }

    /// Standardize a matrix with the fitted coefficients.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(ChurnError::Inference(format!(
                "scaler was fitted on {} features but received {}",
                self.n_features(),
                x.ncols()
            )));
        }
        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[c]) / self.std[c];
            }
        }
        Ok(out)
    }

    /// Standardize a single feature vector, returned as a one-row matrix.
    pub fn transform_row(&self, row: &[f64]) -> Result<Array2<f64>> {
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(|e| ChurnError::Inference(e.to_string()))?;
        self.transform(&x)
    }
}

/// Fit a `Scaler` from a matrix where rows are samples and columns are features.
pub fn fit_scaler(x: &Array2<f64>) -> Result<Scaler> {
    let (nrows, ncols) = x.dim();
    if nrows == 0 || ncols == 0 {
        return Err(ChurnError::InsufficientData(
            "fit_scaler requires a non-empty matrix".to_string(),
        ));
    }

    let nrows_f = nrows as f64;
    let mut mean = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, v) in row.iter().enumerate() {
            mean[c] += v;
        }
    }
    for v in mean.iter_mut() {
        *v /= nrows_f;
    }

    let mut std = vec![0.0f64; ncols];
    for row in x.rows() {
        for (c, v) in row.iter().enumerate() {
            let d = v - mean[c];
            std[c] += d * d;
        }
    }
    for v in std.iter_mut() {
        let s = (*v / nrows_f).sqrt();
        *v = if s < Scaler::MIN_STD { 1.0 } else { s };
    }

    Ok(Scaler { mean, std })
}

/// Transform all rows using the provided `Scaler` and return a new matrix.
pub fn transform_all(x: &Array2<f64>, sc: &Scaler) -> Result<Array2<f64>> {
    sc.transform(x)
}

/// Fit a scaler and return it with the transformed matrix.
pub fn fit_transform(x: &Array2<f64>) -> Result<(Scaler, Array2<f64>)> {
    let sc = fit_scaler(x)?;
    let transformed = sc.transform(x)?;
    Ok((sc, transformed))
}
