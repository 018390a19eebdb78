//! churnwise-classifiers: customer churn prediction with a decision tree and
//! a k-nearest-neighbours classifier.
//!
//! The crate covers the whole model lifecycle: loading and encoding the
//! customer dataset, a stratified split and standard scaling, fitting both
//! classifiers, scoring them on the held-out rows, persisting the artifacts
//! as JSON and serving single-record and whole-dataset predictions from a
//! restored artifact set.
pub mod config;
pub mod data_handling;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod report;
pub mod serving;
pub mod stats;
pub mod training;

pub use error::{ChurnError, Result};
