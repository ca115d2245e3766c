//! Storage module for persisting harvested records
//!
//! This module handles:
//! - The fixed-shape `Record` written to the output file
//! - The NDJSON append-only sink
//! - The dedup index seeded from that sink

mod dedup;
mod ndjson;
mod traits;

pub use dedup::DedupStore;
pub use ndjson::NdjsonSink;
pub use traits::{LoadReport, RecordSink, StorageError, StorageResult};

use serde::{Deserialize, Serialize};

/// One harvested product card
///
/// Field names on disk follow the established output format so that files
/// written by earlier harvests keep seeding the dedup index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Product page URL; the uniqueness key
    #[serde(rename = "product_url")]
    pub url: String,

    /// Numeric id taken from the product URL
    #[serde(rename = "product_id")]
    pub id: Option<String>,

    #[serde(rename = "product_title")]
    pub title: String,

    /// Decimal string such as `"12.99"`
    pub price: Option<String>,

    #[serde(rename = "amount_sold_count")]
    pub sold_count: u64,

    #[serde(rename = "product_rating")]
    pub rating: Option<String>,

    #[serde(rename = "product_thumbnail")]
    pub thumbnail_url: Option<String>,
}

impl Record {
    /// Creates a record with only a url and title set
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: crate::url::product_id_from_url(&url),
            url,
            title: title.into(),
            price: None,
            sold_count: 0,
            rating: None,
            thumbnail_url: None,
        }
    }
}
