use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Listing-Harvester
///
/// Every section is optional in the TOML file; missing values fall back to
/// the defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which pages to harvest and how hard to push
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Listing URL used as the pagination template
    #[serde(rename = "start-url", default = "default_start_url")]
    pub start_url: String,

    /// Number of pages to harvest, numbered from 1 (default 6)
    #[serde(rename = "total-pages", default = "default_total_pages")]
    pub total_pages: u32,

    /// Maximum number of page pipelines in flight (default 3)
    #[serde(rename = "concurrency-limit", default = "default_concurrency_limit")]
    pub concurrency_limit: u32,

    /// Fetch attempts per page before giving up (default 3)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,
}

/// Courtesy delay applied before every page fetch, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Fixed part of the delay (default 2.0)
    #[serde(rename = "base-delay", default = "default_throttle_base")]
    pub base_delay: f64,

    /// Lower bound of the random addition (default 0.5)
    #[serde(rename = "random-delay-min", default = "default_random_min")]
    pub random_delay_min: f64,

    /// Upper bound of the random addition (default 1.5)
    #[serde(rename = "random-delay-max", default = "default_random_max")]
    pub random_delay_max: f64,
}

/// Backoff between fetch attempts, in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Wait before the first retry (default 2.0)
    #[serde(rename = "base-delay", default = "default_retry_base")]
    pub base_delay: f64,

    /// Exponential multiplier per attempt (default 2.0)
    #[serde(rename = "backoff-factor", default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound of the uniform jitter (default 1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Cap on any single backoff (default 30.0)
    #[serde(rename = "max-delay", default = "default_max_delay")]
    pub max_delay: f64,
}

/// Unlocker API settings
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_zone")]
    pub zone: String,

    /// Per-request timeout (default 60)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Name of the environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the NDJSON record file
    #[serde(rename = "output-path", default = "default_output_path")]
    pub output_path: String,

    /// Directory for raw HTML snapshots; disabled when absent
    #[serde(rename = "debug-dir", default)]
    pub debug_dir: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            start_url: default_start_url(),
            total_pages: default_total_pages(),
            concurrency_limit: default_concurrency_limit(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay: default_throttle_base(),
            random_delay_min: default_random_min(),
            random_delay_max: default_random_max(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: default_retry_base(),
            backoff_factor: default_backoff_factor(),
            jitter: default_jitter(),
            max_delay: default_max_delay(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            zone: default_zone(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            debug_dir: None,
        }
    }
}

fn default_start_url() -> String {
    "https://www.aliexpress.com/w/wholesale-phone-watch.html?SearchText=phone+watch&page=1"
        .to_string()
}

fn default_total_pages() -> u32 {
    6
}

fn default_concurrency_limit() -> u32 {
    3
}

fn default_max_retries() -> u32 {
    3
}

fn default_throttle_base() -> f64 {
    2.0
}

fn default_random_min() -> f64 {
    0.5
}

fn default_random_max() -> f64 {
    1.5
}

fn default_retry_base() -> f64 {
    2.0
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    30.0
}

fn default_api_url() -> String {
    "https://api.brightdata.com/request".to_string()
}

fn default_zone() -> String {
    "web_unlocker1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_api_key_env() -> String {
    "BRIGHTDATA_API_KEY".to_string()
}

fn default_output_path() -> String {
    "aliexpress_products.json".to_string()
}
