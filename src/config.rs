use crate::error::{ConfigError, RequestError};
use crate::extract::ScrollOptions;
use crate::filter::{EnqueueStrategy, UrlFilter, UrlFilterConfig, default_exclude_patterns};
use crate::request::{Label, Request};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Crawler input, read from a JSON file with camelCase keys
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerInput {
    /// Maximum number of requests to process (0 = unbounded)
    #[serde(default)]
    pub max_items: usize,

    /// URLs the crawl starts from, processed by the default handler
    #[serde(default = "default_seed_urls")]
    pub seed_urls: Vec<String>,

    /// Number of concurrent workers
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Upper bound for loading one page
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Upper bound for one handler invocation, navigation included
    #[serde(default = "default_request_handler_timeout_secs")]
    pub request_handler_timeout_secs: u64,

    /// Where the dataset is exported (CSV, or JSON for `.json` paths)
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Scope of product links enqueued from listing pages
    #[serde(default)]
    pub enqueue_strategy: EnqueueStrategy,

    /// Regex patterns for discovered links to skip
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub interaction: InteractionConfig,
}

/// Timeouts for the best-effort page interactions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionConfig {
    /// How long to wait for the cookie consent dialog
    #[serde(default = "default_consent_timeout_ms")]
    pub consent_timeout_ms: u64,

    /// How long to wait for network quiescence on listing pages
    #[serde(default = "default_network_idle_timeout_ms")]
    pub network_idle_timeout_ms: u64,

    /// Network quiescence wait after each scroll
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,

    /// Scroll rounds without new content before a listing counts as complete
    #[serde(default = "default_stable_scroll_rounds")]
    pub stable_scroll_rounds: u32,

    #[serde(default = "default_max_scroll_rounds")]
    pub max_scroll_rounds: u32,

    #[serde(default = "default_max_scroll_secs")]
    pub max_scroll_secs: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            consent_timeout_ms: default_consent_timeout_ms(),
            network_idle_timeout_ms: default_network_idle_timeout_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
            stable_scroll_rounds: default_stable_scroll_rounds(),
            max_scroll_rounds: default_max_scroll_rounds(),
            max_scroll_secs: default_max_scroll_secs(),
        }
    }
}

impl InteractionConfig {
    pub fn consent_timeout(&self) -> Duration {
        Duration::from_millis(self.consent_timeout_ms)
    }

    pub fn network_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.network_idle_timeout_ms)
    }

    pub fn scroll_options(&self) -> ScrollOptions {
        ScrollOptions {
            settle_timeout: Duration::from_millis(self.scroll_settle_ms),
            stable_rounds: self.stable_scroll_rounds,
            max_rounds: self.max_scroll_rounds,
            max_duration: Duration::from_secs(self.max_scroll_secs),
        }
    }
}

/// Settings the crawl loop runs with
#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub max_concurrency: usize,
    /// 0 = unbounded
    pub max_requests: usize,
    pub navigation_timeout: Duration,
    pub request_handler_timeout: Duration,
    pub interaction: InteractionConfig,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            max_requests: 0,
            navigation_timeout: Duration::from_secs(default_navigation_timeout_secs()),
            request_handler_timeout: Duration::from_secs(default_request_handler_timeout_secs()),
            interaction: InteractionConfig::default(),
        }
    }
}

/// Default value for seed_urls
fn default_seed_urls() -> Vec<String> {
    vec!["https://nike.com/".to_string()]
}

/// Default value for max_concurrency
fn default_max_concurrency() -> usize {
    5
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_request_handler_timeout_secs() -> u64 {
    60
}

fn default_output_path() -> PathBuf {
    PathBuf::from("shoes.csv")
}

fn default_consent_timeout_ms() -> u64 {
    3000
}

fn default_network_idle_timeout_ms() -> u64 {
    10_000
}

fn default_scroll_settle_ms() -> u64 {
    2000
}

fn default_stable_scroll_rounds() -> u32 {
    2
}

fn default_max_scroll_rounds() -> u32 {
    200
}

fn default_max_scroll_secs() -> u64 {
    120
}

impl Default for CrawlerInput {
    fn default() -> Self {
        Self {
            max_items: 0,
            seed_urls: default_seed_urls(),
            max_concurrency: default_max_concurrency(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            request_handler_timeout_secs: default_request_handler_timeout_secs(),
            output_path: default_output_path(),
            enqueue_strategy: EnqueueStrategy::default(),
            exclude_patterns: default_exclude_patterns(),
            interaction: InteractionConfig::default(),
        }
    }
}

impl CrawlerInput {
    /// Load input from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Seed requests for the default handler
    pub fn seed_requests(&self) -> Result<Vec<Request>, RequestError> {
        self.seed_urls
            .iter()
            .map(|url| Request::from_url(url, Label::Default))
            .collect()
    }

    pub fn url_filter(&self) -> Result<UrlFilter, ConfigError> {
        Ok(UrlFilter::new(UrlFilterConfig {
            strategy: self.enqueue_strategy,
            include_patterns: Vec::new(),
            exclude_patterns: self.exclude_patterns.clone(),
        })?)
    }

    /// Replace the WebDriver URL unless `url` is missing or empty
    pub fn override_webdriver_url(&mut self, url: Option<String>) -> bool {
        match url {
            Some(url) if !url.trim().is_empty() => {
                self.webdriver_url = url;
                true
            }
            _ => false,
        }
    }

    pub fn crawler_options(&self) -> CrawlerOptions {
        CrawlerOptions {
            max_concurrency: self.max_concurrency.max(1),
            max_requests: self.max_items,
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            request_handler_timeout: Duration::from_secs(self.request_handler_timeout_secs),
            interaction: self.interaction.clone(),
        }
    }
}
