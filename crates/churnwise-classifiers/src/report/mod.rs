//! Plotting helpers for the analysis and comparison pages.
//!
//! Each helper turns dataset statistics or evaluation metrics into a
//! `plotly::Plot` that callers embed with `Plot::to_inline_html`.
pub mod plots;
