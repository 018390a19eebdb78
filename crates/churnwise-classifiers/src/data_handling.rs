//! Loading and summarising the customer churn dataset.
//!
//! The dataset is kept as a light table of header names and string cells so
//! that the encoding and feature extraction steps can report missing columns
//! themselves. Typed `CustomerRecord` rows are derived on demand.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

pub const CUSTOMER_ID: &str = "Customer_ID";
pub const AGE: &str = "Age";
pub const MONTHLY_SPEND: &str = "Monthly_Spend_INR";
pub const TENURE: &str = "Tenure_Months";
pub const RECHARGE_TYPE: &str = "Recharge_Type";
pub const DATA_USAGE: &str = "Data_Usage_GB_Month";
pub const COMPLAINTS: &str = "Complaints_Last_3_Months";
pub const CHURN: &str = "Churn";

/// Label stored in the `Churn` column for churned customers.
pub const CHURN_POSITIVE: &str = "Yes";

/// One row of the raw dataset, keyed by the CSV column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(rename = "Customer_ID")]
    pub customer_id: String,
    #[serde(rename = "Age")]
    pub age: i64,
    #[serde(rename = "Monthly_Spend_INR")]
    pub monthly_spend: f64,
    #[serde(rename = "Tenure_Months")]
    pub tenure_months: i64,
    #[serde(rename = "Recharge_Type")]
    pub recharge_type: String,
    #[serde(rename = "Data_Usage_GB_Month")]
    pub data_usage_gb: f64,
    #[serde(rename = "Complaints_Last_3_Months")]
    pub complaints: i64,
    #[serde(rename = "Churn")]
    pub churn: String,
}

impl CustomerRecord {
    pub fn is_churned(&self) -> bool {
        self.churn == CHURN_POSITIVE
    }
}

/// In-memory copy of a delimited dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Descriptive statistics shown on the analysis page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_customers: usize,
    pub churned: usize,
    pub retained: usize,
    /// Percentage of churned customers, two decimals.
    pub churn_rate: f64,
    pub avg_age: f64,
    pub avg_spend: f64,
    pub avg_tenure: f64,
    /// Churned customers per recharge plan.
    pub churn_by_type: BTreeMap<String, usize>,
    /// Empty cells per column.
    pub missing_values: BTreeMap<String, usize>,
}

impl CustomerTable {
    /// Parse a table from any reader. `delimiter` is usually `b','`.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ChurnError::DataLoad(format!("unreadable header row: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| ChurnError::DataLoad(format!("row {}: {}", i + 1, e)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if headers.is_empty() || rows.is_empty() {
            return Err(ChurnError::DataLoad("dataset contains no rows".to_string()));
        }

        Ok(CustomerTable { headers, rows })
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn ncols(&self) -> usize {
        self.headers.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Borrow every cell of a column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ChurnError::Schema(format!("missing column '{}'", name)))?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
            .collect())
    }

    /// Parse a column as floating point values.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                cell.parse::<f64>().map_err(|_| {
                    ChurnError::DataLoad(format!(
                        "column '{}' row {}: '{}' is not a number",
                        name,
                        i + 1,
                        cell
                    ))
                })
            })
            .collect()
    }

    /// Return a copy with an extra column appended.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(ChurnError::Schema(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        let mut out = self.clone();
        match out.column_index(name) {
            Some(idx) => {
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                out.headers.push(name.to_string());
                for (row, value) in out.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(out)
    }

    /// Deserialize every row into a typed record.
    pub fn records(&self) -> Result<Vec<CustomerRecord>> {
        let headers = StringRecord::from(self.headers.clone());
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                StringRecord::from(row.clone())
                    .deserialize::<CustomerRecord>(Some(&headers))
                    .map_err(|e| ChurnError::DataLoad(format!("row {}: {}", i + 1, e)))
            })
            .collect()
    }

    pub fn log_input_data_summary(&self) {
        log::info!("----- Input Data Summary -----");
        log::info!("{} rows, {} columns", self.nrows(), self.ncols());
        if let Ok(churn) = self.column(CHURN) {
            let churned = churn.iter().filter(|&&v| v == CHURN_POSITIVE).count();
            log::info!(
                "{} churned and {} retained customers ({:.2}% churn)",
                churned,
                churn.len() - churned,
                churned as f64 / churn.len() as f64 * 100.0
            );
        }
        log::info!("------------------------------");
    }

    /// Compute the descriptive statistics of the analysis page.
    pub fn summary(&self) -> Result<DatasetSummary> {
        let records = self.records()?;
        let total = records.len();
        let churned = records.iter().filter(|r| r.is_churned()).count();

        let mean = |f: &dyn Fn(&CustomerRecord) -> f64| {
            records.iter().map(f).sum::<f64>() / total as f64
        };

        let mut churn_by_type = BTreeMap::new();
        for record in records.iter().filter(|r| r.is_churned()) {
            *churn_by_type.entry(record.recharge_type.clone()).or_insert(0) += 1;
        }

        let missing_values = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let missing = self
                    .rows
                    .iter()
                    .filter(|row| row.get(idx).map_or(true, |cell| cell.is_empty()))
                    .count();
                (name.clone(), missing)
            })
            .collect();

        Ok(DatasetSummary {
            total_customers: total,
            churned,
            retained: total - churned,
            churn_rate: round_to(churned as f64 / total as f64 * 100.0, 2),
            avg_age: round_to(mean(&|r| r.age as f64), 1),
            avg_spend: round_to(mean(&|r| r.monthly_spend), 2),
            avg_tenure: round_to(mean(&|r| r.tenure_months as f64), 1),
            churn_by_type,
            missing_values,
        })
    }
}

/// Load the customer dataset from a CSV (or TSV) file.
pub fn load_customers<P: AsRef<Path>>(path: P) -> Result<CustomerTable> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| ChurnError::DataLoad(format!("{}: {}", path.display(), e)))?;

    let is_tsv = path.extension().map(|e| e == "tsv").unwrap_or(false);
    let delimiter = if is_tsv { b'\t' } else { b',' };

    let table = CustomerTable::from_reader(BufReader::new(file), delimiter)?;
    log::info!(
        "Loaded {} with shape ({}, {})",
        path.display(),
        table.nrows(),
        table.ncols()
    );
    Ok(table)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
