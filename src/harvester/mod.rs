//! Harvester module for fetching listing pages and extracting records
//!
//! This module contains the core harvesting logic, including:
//! - The page transport and its unlocker-backed implementation
//! - Per-page fetching with exponential backoff
//! - Product card extraction and normalization
//! - Concurrent page orchestration

mod extractor;
mod fetcher;
mod orchestrator;
mod pacing;
mod retry;
mod transport;

pub use extractor::{
    clean_price, normalize, sold_count, CandidateExtractor, ExtractionAdapter,
    ListingCardExtractor, RawFields,
};
pub use fetcher::{validate_document, FetchFailure, FetchOutcome, PageFetcher};
pub use orchestrator::Orchestrator;
pub use pacing::{CourtesyDelay, Jitter, Sleeper, TokioSleeper};
pub use retry::RetryPolicy;
pub use transport::{build_http_client, Transport, TransportError, UnlockerTransport};

use crate::config::{resolve_api_key, validate, Config};
use crate::output::RunSummary;
use crate::storage::{DedupStore, NdjsonSink};
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete harvest over the given transport
///
/// This is the main entry point for a harvest. It will:
/// 1. Validate the configuration
/// 2. Seed the dedup index from the output file
/// 3. Fetch, extract and commit every configured page
///
/// Page failures are reported in the summary, not returned as errors.
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `transport` - Where page HTML comes from
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every page pipeline finished
/// * `Err(HarvestError)` - The run could not start
pub async fn harvest(
    config: Config,
    transport: Arc<dyn Transport>,
) -> Result<RunSummary, HarvestError> {
    validate(&config)?;

    let sink = NdjsonSink::new(&config.output.output_path);
    let store = DedupStore::load(sink)?;

    tracing::info!(
        "Loaded {} known product urls from {}",
        store.len(),
        config.output.output_path
    );

    let orchestrator = Orchestrator::new(config, transport, store)?;
    Ok(orchestrator.run_configured().await)
}

/// Runs a harvest through the unlocker API
///
/// The API key is resolved before anything else so a missing credential
/// fails the run without touching the network or the output file.
pub async fn harvest_with_unlocker(config: Config) -> Result<RunSummary, HarvestError> {
    let api_key = resolve_api_key(&config.transport)?;
    let transport = UnlockerTransport::new(&config.transport, api_key)?;

    harvest(config, Arc::new(transport)).await
}
