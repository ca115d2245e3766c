//! Run summary produced at the end of a harvest

use chrono::{DateTime, Utc};

/// What happened to one page pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// 1-based page number
    pub index: u32,

    pub url: String,

    /// True when the fetch produced a usable document
    pub succeeded: bool,

    /// Fetch attempts made (0 if the pipeline never reached the fetch)
    pub attempts: u32,

    /// Records the extraction produced
    pub extracted: usize,

    /// Records newly written to the sink
    pub committed: usize,

    /// Final failure reason, if any
    pub error: Option<String>,
}

impl PageReport {
    /// Report for a pipeline that died before reporting for itself
    pub fn aborted(index: u32, url: String, error: String) -> Self {
        Self {
            index,
            url,
            succeeded: false,
            attempts: 0,
            extracted: 0,
            committed: 0,
            error: Some(error),
        }
    }
}

/// Aggregate counts for a harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_attempted: u32,
    pub pages_succeeded: u32,
    pub pages_failed: u32,
    pub records_committed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-page detail ordered by page number
    pub pages: Vec<PageReport>,
}

impl RunSummary {
    /// Folds page reports into the run totals
    pub fn from_reports(
        mut pages: Vec<PageReport>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        pages.sort_by_key(|page| page.index);

        let pages_succeeded = pages.iter().filter(|p| p.succeeded).count() as u32;
        let pages_attempted = pages.len() as u32;

        Self {
            pages_attempted,
            pages_succeeded,
            pages_failed: pages_attempted - pages_succeeded,
            records_committed: pages.iter().map(|p| p.committed).sum(),
            started_at,
            finished_at,
            pages,
        }
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageReport> {
        self.pages.iter().filter(|p| !p.succeeded)
    }
}

/// Prints a run summary to stdout
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Run:");
    println!("  Started:  {}", summary.started_at.to_rfc3339());
    println!("  Finished: {}", summary.finished_at.to_rfc3339());
    println!(
        "  Duration: {:.1}s",
        summary.duration().num_milliseconds() as f64 / 1000.0
    );
    println!();

    println!("Pages:");
    println!("  Attempted: {}", summary.pages_attempted);
    println!("  Succeeded: {}", summary.pages_succeeded);
    println!("  Failed:    {}", summary.pages_failed);
    println!();

    println!("Records newly committed: {}", summary.records_committed);

    if summary.pages_failed > 0 {
        println!("\nFailed Pages:");
        for page in summary.failed_pages() {
            println!(
                "  - page {} after {} attempt(s): {}",
                page.index,
                page.attempts,
                page.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: u32, succeeded: bool, committed: usize) -> PageReport {
        PageReport {
            index,
            url: format!("https://x.test/list?page={}", index),
            succeeded,
            attempts: 1,
            extracted: committed,
            committed,
            error: if succeeded { None } else { Some("timeout".to_string()) },
        }
    }

    #[test]
    fn test_from_reports_aggregates_and_orders() {
        let now = Utc::now();
        let summary = RunSummary::from_reports(
            vec![page(3, false, 0), page(1, true, 4), page(2, true, 2)],
            now,
            now,
        );

        assert_eq!(summary.pages_attempted, 3);
        assert_eq!(summary.pages_succeeded, 2);
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.records_committed, 6);
        assert_eq!(
            summary.pages.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(summary.failed_pages().count(), 1);
    }

    #[test]
    fn test_empty_run() {
        let now = Utc::now();
        let summary = RunSummary::from_reports(vec![], now, now);

        assert_eq!(summary.pages_attempted, 0);
        assert_eq!(summary.records_committed, 0);
        assert_eq!(summary.duration(), chrono::Duration::zero());
    }

    #[test]
    fn test_aborted_report() {
        let report = PageReport::aborted(5, "https://x.test".to_string(), "panic".to_string());
        assert!(!report.succeeded);
        assert_eq!(report.committed, 0);
        assert_eq!(report.error.as_deref(), Some("panic"));
    }
}
