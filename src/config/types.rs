use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration structure
///
/// Every section is optional in the TOML file; missing keys fall back to
/// the defaults below. CLI flags are applied on top by the binary.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// URL the crawl starts from (depth 0)
    #[serde(default)]
    pub seed_url: Option<String>,

    /// Maximum depth to crawl from the seed URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of concurrent fetches
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of URLs dispatched per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Stop after resolving this many pages in a run (0 = unlimited)
    #[serde(default)]
    pub max_pages: u64,

    /// How long in-flight fetches may run after a stop signal (milliseconds)
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_url: None,
            max_depth: default_max_depth(),
            workers: default_workers(),
            batch_size: default_batch_size(),
            max_pages: 0,
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout covering connect, headers and body (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// TCP/TLS connect timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Extra attempts for transient failures (0 = no retry)
    #[serde(default)]
    pub max_retries: u32,

    /// Delay between retry attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory holding per-run checkpoint files
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

/// Topic classifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClassifierConfig {
    /// Labels the classifier chooses between
    #[serde(default = "default_candidate_labels")]
    pub candidate_labels: Vec<String>,

    /// Extra vocabulary per label, used by the keyword classifier
    #[serde(default)]
    pub keywords: BTreeMap<String, Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            candidate_labels: default_candidate_labels(),
            keywords: BTreeMap::new(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_workers() -> usize {
    8
}

fn default_batch_size() -> usize {
    32
}

fn default_shutdown_grace_ms() -> u64 {
    5_000
}

fn default_user_agent() -> String {
    format!("strata-crawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_database_path() -> String {
    "./crawl.db".to_string()
}

fn default_checkpoint_dir() -> String {
    "./checkpoints".to_string()
}

fn default_candidate_labels() -> Vec<String> {
    [
        "technology",
        "science",
        "business",
        "politics",
        "sports",
        "entertainment",
        "health",
        "education",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
