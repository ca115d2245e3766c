//! Page fetcher
//!
//! This module wraps the transport with:
//! - Document shape validation (empty or marker-less bodies are retried)
//! - Bounded retries driven by `FetchState`
//! - Backoff through the injected sleeper
//! - One log event per attempt
//! - Optional raw HTML snapshots for debugging selectors

use crate::harvester::pacing::{Jitter, Sleeper};
use crate::harvester::retry::RetryPolicy;
use crate::harvester::transport::{Transport, TransportError};
use crate::state::FetchState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Marker every usable document must contain (compared case-insensitively)
const DOCUMENT_MARKER: &str = "<html";

const LAST_FETCHED_SNAPSHOT: &str = "last_fetched_page.html";
const FAILED_SNAPSHOT: &str = "debug_failed_page.html";

/// Why a single attempt did not produce a usable document
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("empty response")]
    Empty,

    #[error("response is not an HTML document")]
    Malformed,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result of fetching one page, retries included
#[derive(Debug)]
pub enum FetchOutcome {
    /// A usable document was returned
    Success {
        content: String,
        /// 1-based attempt that succeeded
        attempts: u32,
    },

    /// Every allowed attempt failed
    Failure {
        /// Failure of the final attempt
        reason: FetchFailure,
        attempts: u32,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }
}

/// Retrieves pages through a transport with retry and validation
pub struct PageFetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    jitter: Arc<Jitter>,
    sleeper: Arc<dyn Sleeper>,
    debug_dir: Option<PathBuf>,
}

impl PageFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        jitter: Arc<Jitter>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            transport,
            retry,
            jitter,
            sleeper,
            debug_dir: None,
        }
    }

    /// Writes raw HTML snapshots into `dir`
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    /// Fetches `url`, making at most `max_retries` attempts
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Usable document | Return `Success` immediately |
    /// | Empty body | Back off, retry |
    /// | No `<html` marker | Back off, retry |
    /// | Transport error / timeout | Back off, retry |
    /// | Budget exhausted | Return `Failure` with the last reason |
    ///
    /// A budget of 0 is treated as 1. Nothing escapes as an error.
    pub async fn fetch(&self, url: &str, max_retries: u32) -> FetchOutcome {
        let max_attempts = max_retries.max(1);
        let mut state = FetchState::Pending;

        loop {
            let attempt = state.next_attempt();

            match self.attempt(url).await {
                Ok(content) => {
                    state = advance(state, state.after_success());
                    tracing::info!(
                        url,
                        attempt,
                        max_attempts,
                        state = %state,
                        bytes = content.len(),
                        "Page fetch succeeded"
                    );

                    if attempt == 1 {
                        self.write_snapshot(LAST_FETCHED_SNAPSHOT, &content).await;
                    }

                    return FetchOutcome::Success {
                        content,
                        attempts: attempt,
                    };
                }
                Err((reason, body)) => {
                    if let (FetchFailure::Malformed, Some(body)) = (&reason, body.as_deref()) {
                        self.write_snapshot(FAILED_SNAPSHOT, body).await;
                    }

                    state = advance(state, state.after_failure(max_attempts));

                    if state.is_terminal() {
                        tracing::error!(
                            url,
                            attempt,
                            max_attempts,
                            state = %state,
                            "Page fetch failed, giving up: {}",
                            reason
                        );
                        return FetchOutcome::Failure {
                            reason,
                            attempts: attempt,
                        };
                    }

                    let delay = self.retry.delay(attempt, &self.jitter);
                    tracing::warn!(
                        url,
                        attempt,
                        max_attempts,
                        state = %state,
                        "Page fetch failed: {}; retrying in {:.2}s",
                        reason,
                        delay.as_secs_f64()
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }

    /// One transport call plus validation
    ///
    /// On a malformed document the body is handed back for the snapshot.
    async fn attempt(&self, url: &str) -> Result<String, (FetchFailure, Option<String>)> {
        let content = self
            .transport
            .fetch_html(url)
            .await
            .map_err(|e| (FetchFailure::from(e), None))?;

        match validate_document(&content) {
            Ok(()) => Ok(content),
            Err(FetchFailure::Malformed) => Err((FetchFailure::Malformed, Some(content))),
            Err(reason) => Err((reason, None)),
        }
    }

    async fn write_snapshot(&self, name: &str, content: &str) {
        let Some(dir) = self.debug_dir.as_deref() else {
            return;
        };

        if let Err(e) = write_snapshot_file(dir, name, content).await {
            tracing::warn!("Could not write debug snapshot {}: {}", name, e);
        }
    }
}

fn advance(current: FetchState, next: FetchState) -> FetchState {
    debug_assert!(
        current.can_transition_to(next),
        "illegal fetch state transition {} -> {}",
        current,
        next
    );
    next
}

async fn write_snapshot_file(dir: &Path, name: &str, content: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(name), content).await
}

/// Checks that a body looks like an HTML document
pub fn validate_document(content: &str) -> Result<(), FetchFailure> {
    if content.trim().is_empty() {
        return Err(FetchFailure::Empty);
    }

    if !content.to_ascii_lowercase().contains(DOCUMENT_MARKER) {
        return Err(FetchFailure::Malformed);
    }

    Ok(())
}
