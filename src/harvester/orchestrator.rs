//! Harvest orchestrator - runs every page pipeline under a concurrency cap
//!
//! Each page is one tokio task doing courtesy delay → fetch → extract →
//! admit → commit while holding a semaphore permit. Pages complete in any
//! order; the only cross-page ordering lives inside the `DedupStore`.

use crate::config::Config;
use crate::harvester::extractor::{CandidateExtractor, ExtractionAdapter, ListingCardExtractor};
use crate::harvester::fetcher::{FetchOutcome, PageFetcher};
use crate::harvester::pacing::{CourtesyDelay, Jitter, Sleeper, TokioSleeper};
use crate::harvester::retry::RetryPolicy;
use crate::harvester::transport::Transport;
use crate::output::{PageReport, RunSummary};
use crate::storage::{DedupStore, Record};
use crate::url::{with_page_param, PageRequest};
use crate::HarvestError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Main harvest orchestrator
pub struct Orchestrator {
    config: Arc<Config>,
    template: Url,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn CandidateExtractor>,
    store: Arc<DedupStore>,
    jitter: Arc<Jitter>,
    sleeper: Arc<dyn Sleeper>,
}

impl Orchestrator {
    /// Creates a new orchestrator
    ///
    /// Uses the listing card extractor, an OS-seeded random source and the
    /// tokio timer; each can be replaced with the `with_*` methods.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated harvest configuration
    /// * `transport` - Page transport shared by all pipelines
    /// * `store` - Dedup index already seeded from the output file
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(HarvestError)` - The start URL or the card selectors are invalid
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        store: DedupStore,
    ) -> Result<Self, HarvestError> {
        let template = with_page_param(&config.harvest.start_url, 1)?;

        Ok(Self {
            config: Arc::new(config),
            template,
            transport,
            extractor: Arc::new(ListingCardExtractor::new()?),
            store: Arc::new(store),
            jitter: Arc::new(Jitter::from_os()),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn CandidateExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Runs with the page count and concurrency limit from the configuration
    pub async fn run_configured(&self) -> RunSummary {
        self.run(
            self.config.harvest.total_pages,
            self.config.harvest.concurrency_limit as usize,
        )
        .await
    }

    /// Harvests pages `1..=page_count` with at most `concurrency_limit` in flight
    ///
    /// Failed pages are reported in the summary; they never abort the run.
    /// Returns only after every page pipeline has finished.
    pub async fn run(&self, page_count: u32, concurrency_limit: usize) -> RunSummary {
        let started_at = Utc::now();
        let concurrency = concurrency_limit.clamp(1, Semaphore::MAX_PERMITS);

        tracing::info!(
            "Starting harvest of {} pages (concurrency={}, known urls={})",
            page_count,
            concurrency,
            self.store.len()
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let pipeline = Arc::new(self.pipeline(page_count));

        let mut handles = Vec::with_capacity(page_count as usize);
        for index in 1..=page_count {
            let request = PageRequest::new(&self.template, index);
            let url = request.url().to_string();
            let semaphore = semaphore.clone();
            let pipeline = pipeline.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                pipeline.process(request).await
            });
            handles.push((index, url, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (index, url, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("Page {} pipeline aborted: {}", index, e);
                    reports.push(PageReport::aborted(index, url, e.to_string()));
                }
            }
        }

        let summary = RunSummary::from_reports(reports, started_at, Utc::now());

        tracing::info!(
            "Finished harvesting {} pages: {} succeeded, {} failed, {} new records",
            summary.pages_attempted,
            summary.pages_succeeded,
            summary.pages_failed,
            summary.records_committed
        );

        summary
    }

    fn pipeline(&self, total: u32) -> PagePipeline {
        let fetcher = PageFetcher::new(
            self.transport.clone(),
            RetryPolicy::from(&self.config.retry),
            self.jitter.clone(),
            self.sleeper.clone(),
        )
        .with_debug_dir(self.config.output.debug_dir.as_ref().map(PathBuf::from));

        PagePipeline {
            fetcher,
            adapter: ExtractionAdapter::new(self.extractor.clone()),
            store: self.store.clone(),
            courtesy: CourtesyDelay::from(&self.config.throttle),
            jitter: self.jitter.clone(),
            sleeper: self.sleeper.clone(),
            max_retries: self.config.harvest.max_retries,
            total,
            completed: AtomicU32::new(0),
        }
    }
}

/// Everything one page needs, shared by all page tasks of a run
struct PagePipeline {
    fetcher: PageFetcher,
    adapter: ExtractionAdapter,
    store: Arc<DedupStore>,
    courtesy: CourtesyDelay,
    jitter: Arc<Jitter>,
    sleeper: Arc<dyn Sleeper>,
    max_retries: u32,
    total: u32,
    completed: AtomicU32,
}

impl PagePipeline {
    /// Writes admitted records from the blocking pool
    async fn commit(&self, index: u32, admitted: Vec<Record>) -> usize {
        if admitted.is_empty() {
            return 0;
        }

        let store = self.store.clone();
        match tokio::task::spawn_blocking(move || store.commit(&admitted)).await {
            Ok(committed) => committed,
            Err(e) => {
                tracing::error!("Page {}: commit task aborted: {}", index, e);
                0
            }
        }
    }

    /// fetch → extract → admit → commit for one page
    async fn process(&self, request: PageRequest) -> PageReport {
        let index = request.index();
        let url = request.url().as_str();

        let delay = self.courtesy.sample(&self.jitter);
        tracing::debug!("Page {}: courtesy delay {:.2}s", index, delay.as_secs_f64());
        self.sleeper.sleep(delay).await;

        let report = match self.fetcher.fetch(url, self.max_retries).await {
            FetchOutcome::Success { content, attempts } => {
                let records = self.adapter.extract(&content);
                let extracted = records.len();

                if extracted == 0 {
                    tracing::warn!(
                        "Page {} returned a document with no product cards; the listing layout may have changed",
                        index
                    );
                }

                let admitted = self.store.admit(records);
                let committed = self.commit(index, admitted).await;

                tracing::info!(
                    "Page {}: saved {} new records ({} extracted)",
                    index,
                    committed,
                    extracted
                );

                PageReport {
                    index,
                    url: url.to_string(),
                    succeeded: true,
                    attempts,
                    extracted,
                    committed,
                    error: None,
                }
            }
            FetchOutcome::Failure { reason, attempts } => {
                tracing::error!(
                    "Page {} failed after {} attempt(s): {}",
                    index,
                    attempts,
                    reason
                );

                PageReport {
                    index,
                    url: url.to_string(),
                    succeeded: false,
                    attempts,
                    extracted: 0,
                    committed: 0,
                    error: Some(reason.to_string()),
                }
            }
        };

        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("Progress: {}/{} pages done", done, self.total);

        report
    }
}
