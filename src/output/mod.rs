//! Output module for reporting harvest results
//!
//! This module handles:
//! - The end-of-run summary and its console rendering
//! - Statistics over an existing output file

pub mod stats;
mod summary;

pub use stats::{load_sink_statistics, print_sink_statistics, SinkStatistics};
pub use summary::{print_run_summary, PageReport, RunSummary};
