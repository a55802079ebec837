//! chartcheck: fixture-based regression tests for rendered Helm charts.
//!
//! Each test is a directory holding a `values.yaml` and an `expected.yaml`.
//! A run renders the chart with the test's values, compares the result with
//! the expected manifest source by source after normalizing the YAML, and
//! reports differences. An update run rewrites the expected files instead.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod manifest;
pub mod render;
pub mod report;
pub mod schema;
pub mod suite;
pub mod test_case;
pub mod update;
pub mod validate;
pub mod value;

pub use crate::errors::{ChartTestError, Result};
