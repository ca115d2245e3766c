//! Storage traits and error types
//!
//! This module defines the trait interface for durable record sinks and
//! associated error types.

use crate::storage::Record;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// What a sink found when it was read back at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// The `product_url` of every well-formed entry, in file order
    pub urls: Vec<String>,

    /// Entries that could not be read as a record with a url
    pub malformed: usize,
}

/// Trait for append-only record sinks
///
/// The sink is both the output of a harvest and the source of truth for
/// which urls were already committed; nothing else is persisted.
pub trait RecordSink: Send {
    /// Reads every committed entry back
    ///
    /// Malformed entries are counted in the report, never returned as errors.
    /// An error here means the sink itself could not be read.
    fn load_urls(&self) -> StorageResult<LoadReport>;

    /// Appends one record
    ///
    /// The record is either fully written and flushed or not written at all;
    /// earlier entries are never touched, and a failed append must not leave
    /// bytes that would merge with the next record.
    fn append(&mut self, record: &Record) -> StorageResult<()>;
}
