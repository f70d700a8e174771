use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for nvim-harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub output: OutputConfig,
}

/// GitHub endpoint and authentication configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Base URL of the REST API (search and repository metadata)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL serving raw file content
    #[serde(default = "default_raw_url")]
    pub raw_url: String,

    /// Personal access token; usually supplied via `--token` or the environment instead
    #[serde(default)]
    pub token: Option<String>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            token: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Stop once this many artifacts have been counted (fresh or cached)
    #[serde(default = "default_max_repos")]
    pub max_repos: u64,

    /// Results requested per search page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Deepest page the search API will serve for one query
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Minimum time between governed API requests (milliseconds)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Emit a checkpoint after this many fresh fetches
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: u64,

    /// Branch assumed when repository metadata is unavailable
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Replaces the built-in query catalog when present
    #[serde(default)]
    pub queries: Option<Vec<String>>,
}

impl CrawlConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_repos: default_max_repos(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            min_request_interval_ms: default_min_request_interval_ms(),
            checkpoint_every: default_checkpoint_every(),
            default_branch: default_branch(),
            queries: None,
        }
    }
}

/// Retry policies for the two call classes
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Code search drives the whole crawl, so it retries more patiently
    #[serde(default = "RetryConfig::search_default")]
    pub search: RetryConfig,

    /// Repository metadata and raw content lookups
    #[serde(default = "RetryConfig::api_default")]
    pub api: RetryConfig,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            search: RetryConfig::search_default(),
            api: RetryConfig::api_default(),
        }
    }
}

/// Exponential backoff parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay (milliseconds)
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryConfig {
    pub fn search_default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 2_000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn api_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding one artifact file per repository
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON file holding the resumable crawl state
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Extension of artifact files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            state_file: default_state_file(),
            extension: default_extension(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_user_agent() -> String {
    format!("nvim-harvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_repos() -> u64 {
    1_000_000
}

fn default_page_size() -> u32 {
    100
}

fn default_max_pages() -> u32 {
    10
}

// Code search allows 10 requests per minute even when authenticated
fn default_min_request_interval_ms() -> u64 {
    6_000
}

fn default_checkpoint_every() -> u64 {
    10
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("fetch_state.json")
}

fn default_extension() -> String {
    "lua".to_string()
}
