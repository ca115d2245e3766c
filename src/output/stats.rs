//! Statistics read back from the output file
//!
//! This module provides functionality for inspecting an existing sink
//! without running a harvest.

use crate::storage::{RecordSink, StorageError};
use std::collections::HashSet;

/// What the output file currently holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatistics {
    /// Well-formed entries
    pub total_records: usize,

    /// Distinct product urls among them
    pub unique_urls: usize,

    /// Entries that could not be read as records
    pub malformed_entries: usize,
}

impl SinkStatistics {
    /// Entries sharing a url with an earlier entry
    pub fn duplicate_records(&self) -> usize {
        self.total_records - self.unique_urls
    }
}

/// Loads statistics from a sink
///
/// # Returns
///
/// * `Ok(SinkStatistics)` - Successfully read the sink
/// * `Err(StorageError)` - The sink could not be read
pub fn load_sink_statistics(sink: &dyn RecordSink) -> Result<SinkStatistics, StorageError> {
    let report = sink.load_urls()?;
    let unique: HashSet<&str> = report.urls.iter().map(String::as_str).collect();

    Ok(SinkStatistics {
        total_records: report.urls.len(),
        unique_urls: unique.len(),
        malformed_entries: report.malformed,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_sink_statistics(stats: &SinkStatistics) {
    println!("=== Output Statistics ===\n");

    println!("  Records:          {}", stats.total_records);
    println!("  Unique urls:      {}", stats.unique_urls);
    println!("  Duplicate urls:   {}", stats.duplicate_records());
    println!("  Malformed lines:  {}", stats.malformed_entries);
}
