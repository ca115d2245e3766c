//! Dedup index and single-writer commit path
//!
//! The index holds every url that is either already on disk or has been
//! admitted during this run. Admission is a check-and-mark under one lock,
//! so concurrent page pipelines can never both admit the same url. Appends
//! go through a second lock and reach the sink one record at a time.

use crate::storage::traits::{RecordSink, StorageResult};
use crate::storage::Record;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Previously-seen urls plus the durable sink they came from
pub struct DedupStore {
    index: Mutex<HashSet<String>>,
    sink: Mutex<Box<dyn RecordSink>>,
    malformed_on_load: usize,
}

impl DedupStore {
    /// Seeds the index from everything already committed to `sink`
    ///
    /// # Returns
    ///
    /// * `Ok(DedupStore)` - Index seeded; malformed entries were skipped
    /// * `Err(StorageError)` - The sink exists but could not be read
    pub fn load(sink: impl RecordSink + 'static) -> StorageResult<Self> {
        let report = sink.load_urls()?;

        if report.malformed > 0 {
            tracing::warn!(
                "Skipped {} malformed entries while loading the output file",
                report.malformed
            );
        }

        let index: HashSet<String> = report.urls.into_iter().collect();
        tracing::info!("Loaded {} previously committed urls", index.len());

        Ok(Self {
            index: Mutex::new(index),
            sink: Mutex::new(Box::new(sink)),
            malformed_on_load: report.malformed,
        })
    }

    /// Number of urls currently marked as seen
    pub fn len(&self) -> usize {
        lock(&self.index).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, url: &str) -> bool {
        lock(&self.index).contains(url)
    }

    /// Entries skipped as malformed when the index was seeded
    pub fn malformed_on_load(&self) -> usize {
        self.malformed_on_load
    }

    /// Returns the candidates whose url has not been seen, marking them seen
    ///
    /// Records with an empty url are never admitted. A url repeated within
    /// `candidates` is admitted once, at its first position.
    pub fn admit(&self, candidates: Vec<Record>) -> Vec<Record> {
        let mut index = lock(&self.index);

        candidates
            .into_iter()
            .filter(|record| {
                if record.url.is_empty() {
                    tracing::debug!("Refusing record without url: {:?}", record.title);
                    return false;
                }
                index.insert(record.url.clone())
            })
            .collect()
    }

    /// Appends admitted records to the sink in order
    ///
    /// A record that fails to append is logged and skipped; the rest are
    /// still written.
    ///
    /// # Returns
    ///
    /// The number of records durably written
    pub fn commit(&self, records: &[Record]) -> usize {
        let mut sink = lock(&self.sink);
        let mut written = 0;

        for record in records {
            match sink.append(record) {
                Ok(()) => written += 1,
                Err(e) => {
                    tracing::error!("Failed to persist {}: {}", record.url, e);
                }
            }
        }

        written
    }
}

/// Locks a mutex, recovering the guard if a panicking task poisoned it
///
/// Both guarded values stay consistent across a panic: the index only
/// grows and each append is complete or absent.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
