//! Output module for run reports and database statistics
//!
//! This module handles:
//! - Printing the report of a finished harvest run
//! - Loading and printing statistics from an existing database

mod report;
pub mod stats;

pub use report::{format_run_report, print_run_report};
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
