//! Output module for reports over stored records
//!
//! This module handles the `--stats` report: record counts by kind and
//! quality, the busiest domains and the latest run.

pub mod stats;

pub use stats::{load_statistics, print_statistics, render_statistics, RecordStatistics};
