//! Integration tests for the harvester
//!
//! These tests drive the full page pipeline (fetch, extract, dedup, append)
//! against a scripted in-memory transport, and once end-to-end through the
//! unlocker transport against a wiremock server.

use async_trait::async_trait;
use listing_harvester::config::Config;
use listing_harvester::harvester::{
    harvest, harvest_with_unlocker, Sleeper, Transport, TransportError, UnlockerTransport,
};
use listing_harvester::storage::{DedupStore, NdjsonSink, Record};
use listing_harvester::{HarvestError, Orchestrator};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const START_URL: &str = "https://shop.test/wholesale?SearchText=watch&page=1";

/// Serves a fixed document per page number; unknown pages fail with 502
struct ScriptedTransport {
    pages: HashMap<u32, String>,
    calls: Mutex<HashMap<u32, u32>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    hold: Duration,
}

impl ScriptedTransport {
    fn new(pages: HashMap<u32, String>) -> Self {
        Self {
            pages,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            hold: Duration::ZERO,
        }
    }

    /// Keeps each request open for `hold` so pipelines overlap
    fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    fn calls_for(&self, page: u32) -> u32 {
        self.calls.lock().unwrap().get(&page).copied().unwrap_or(0)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn page_number(url: &str) -> u32 {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch_html(&self, url: &str) -> Result<String, TransportError> {
        let page = page_number(url);
        *self.calls.lock().unwrap().entry(page).or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.pages
            .get(&page)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            })
    }
}

struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

fn product_url(id: u64) -> String {
    format!("https://shop.test/item/{}.html", id)
}

/// A listing page with one product card per id
fn listing(ids: &[u64]) -> String {
    let cards: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<a href="{}"><img src="https://img.test/{id}.jpg"><h3>Product {id}</h3><div class="price">US $1{id},99</div><span class="sold">{id} sold</span></a>"#,
                product_url(*id),
                id = id
            )
        })
        .collect();

    format!("<html><body><div class=\"grid\">{}</div></body></html>", cards)
}

fn test_config(output: &Path) -> Config {
    let mut config = Config::default();
    config.harvest.start_url = START_URL.to_string();
    config.harvest.max_retries = 3;
    config.throttle.base_delay = 0.0;
    config.throttle.random_delay_min = 0.0;
    config.throttle.random_delay_max = 0.0;
    config.retry.base_delay = 0.0;
    config.retry.jitter = 0.0;
    config.retry.max_delay = 0.0;
    config.output.output_path = output.display().to_string();
    config
}

fn read_records(path: &Path) -> Vec<Record> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn committed_urls(path: &Path) -> BTreeSet<String> {
    read_records(path).into_iter().map(|r| r.url).collect()
}

async fn run_scripted(
    output: &Path,
    transport: Arc<ScriptedTransport>,
    pages: u32,
    concurrency: usize,
) -> listing_harvester::RunSummary {
    let store = DedupStore::load(NdjsonSink::new(output)).unwrap();
    let orchestrator = Orchestrator::new(test_config(output), transport, store)
        .unwrap()
        .with_sleeper(Arc::new(NoSleep));

    orchestrator.run(pages, concurrency).await
}

#[tokio::test]
async fn test_fresh_harvest_commits_every_record() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let transport = Arc::new(ScriptedTransport::new(HashMap::from([
        (1, listing(&[101, 102, 103])),
        (2, listing(&[201, 202, 203])),
    ])));

    let summary = run_scripted(&output, transport, 2, 3).await;

    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.records_committed, 6);

    let records = read_records(&output);
    assert_eq!(records.len(), 6);

    let first = records.iter().find(|r| r.url == product_url(101)).unwrap();
    assert_eq!(first.id.as_deref(), Some("101"));
    assert_eq!(first.title, "Product 101");
    assert_eq!(first.price.as_deref(), Some("1101.99"));
    assert_eq!(first.sold_count, 101);
    assert_eq!(first.thumbnail_url.as_deref(), Some("https://img.test/101.jpg"));
}

#[tokio::test]
async fn test_known_urls_are_not_committed_again() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let seeded = serde_json::to_string(&Record::new(product_url(1), "Seeded")).unwrap();
    std::fs::write(&output, format!("{}\n", seeded)).unwrap();

    let transport = Arc::new(ScriptedTransport::new(HashMap::from([(
        1,
        listing(&[1, 2]),
    )])));

    let summary = run_scripted(&output, transport, 1, 3).await;

    assert_eq!(summary.records_committed, 1);

    let records = read_records(&output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "Seeded");
    assert_eq!(records[1].url, product_url(2));
}

#[tokio::test]
async fn test_failing_page_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let transport = Arc::new(ScriptedTransport::new(HashMap::from([
        (1, listing(&[11, 12])),
        (2, listing(&[21])),
    ])));

    let summary = run_scripted(&output, transport.clone(), 3, 2).await;

    assert_eq!(summary.pages_attempted, 3);
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.records_committed, 3);

    let failed: Vec<_> = summary.failed_pages().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 3);
    assert_eq!(failed[0].attempts, 3);
    assert_eq!(transport.calls_for(3), 3);
    assert_eq!(transport.calls_for(1), 1);

    assert_eq!(read_records(&output).len(), 3);
}

#[tokio::test]
async fn test_committed_set_is_independent_of_concurrency() {
    // Pages overlap so that the shared index decides who commits what
    let pages = HashMap::from([
        (1, listing(&[1, 2, 3])),
        (2, listing(&[3, 4, 5])),
        (3, listing(&[5, 6, 1])),
        (4, listing(&[7, 2, 8])),
        (5, listing(&[8, 9, 10])),
    ]);

    let serial_dir = TempDir::new().unwrap();
    let serial_output = serial_dir.path().join("products.json");
    let serial = run_scripted(
        &serial_output,
        Arc::new(ScriptedTransport::new(pages.clone())),
        5,
        1,
    )
    .await;

    let parallel_dir = TempDir::new().unwrap();
    let parallel_output = parallel_dir.path().join("products.json");
    let parallel = run_scripted(
        &parallel_output,
        Arc::new(ScriptedTransport::new(pages).holding(Duration::from_millis(10))),
        5,
        5,
    )
    .await;

    assert_eq!(serial.records_committed, 10);
    assert_eq!(parallel.records_committed, 10);
    assert_eq!(committed_urls(&serial_output), committed_urls(&parallel_output));
    assert_eq!(read_records(&parallel_output).len(), 10);
}

#[tokio::test]
async fn test_in_flight_pages_never_exceed_limit() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let pages: HashMap<u32, String> = (1..=8).map(|p| (p, listing(&[p as u64]))).collect();
    let transport =
        Arc::new(ScriptedTransport::new(pages).holding(Duration::from_millis(20)));

    let summary = run_scripted(&output, transport.clone(), 8, 2).await;

    assert_eq!(summary.pages_succeeded, 8);
    assert!(transport.peak() <= 2, "peak in flight was {}", transport.peak());
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_on_load() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    std::fs::write(
        &output,
        format!(
            "{}\n{{not json\n{}\n[1,2]\n\n{}\n",
            serde_json::to_string(&Record::new(product_url(1), "One")).unwrap(),
            serde_json::to_string(&Record::new(product_url(2), "Two")).unwrap(),
            serde_json::to_string(&Record::new(product_url(3), "Three")).unwrap(),
        ),
    )
    .unwrap();

    let store = DedupStore::load(NdjsonSink::new(&output)).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.malformed_on_load(), 2);

    let transport = Arc::new(ScriptedTransport::new(HashMap::from([(
        1,
        listing(&[1, 2, 3, 4]),
    )])));
    let summary = run_scripted(&output, transport, 1, 1).await;

    assert_eq!(summary.records_committed, 1);
}

#[tokio::test]
async fn test_harvest_through_unlocker_api() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/request"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[900, 901])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let mut config = test_config(&output);
    config.harvest.total_pages = 2;
    config.transport.api_url = format!("{}/request", server.uri());
    config.transport.timeout_secs = 5;

    let transport = UnlockerTransport::new(&config.transport, "test-key".to_string()).unwrap();
    let summary = harvest(config, Arc::new(transport)).await.unwrap();

    // Both pages serve the same cards; only the first sighting is kept
    assert_eq!(summary.pages_succeeded, 2);
    assert_eq!(summary.records_committed, 2);
    assert_eq!(read_records(&output).len(), 2);
}

#[tokio::test]
async fn test_missing_api_key_fails_before_any_work() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("products.json");

    let mut config = test_config(&output);
    config.transport.api_key_env = "LISTING_HARVESTER_TEST_UNSET_KEY".to_string();

    let result = harvest_with_unlocker(config).await;

    assert!(matches!(result, Err(HarvestError::MissingCredential(name)) if name == "LISTING_HARVESTER_TEST_UNSET_KEY"));
    assert!(!output.exists());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir.path().join("products.json"));
    config.harvest.total_pages = 0;

    let transport = Arc::new(ScriptedTransport::new(HashMap::new()));
    let result = harvest(config, transport).await;

    assert!(matches!(result, Err(HarvestError::Config(_))));
}
