#![allow(clippy::too_many_arguments)]

// Re-export modules
pub mod browser;
pub mod config;
pub mod context;
pub mod crawlers;
pub mod dataset;
pub mod error;
pub mod extract;
pub mod filter;
pub mod queue;
pub mod registry;
pub mod request;
pub mod results;
pub mod routes;
pub mod utils;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types for convenience
pub use browser::{Browser, Page, Presence};
pub use config::CrawlerInput;
pub use crawlers::{CrawlState, CrawlStats, Crawler, FinishReason, StopHandle};
pub use dataset::{Dataset, RecordSink};
pub use error::{CrawlError, HandlerError, RegistryError};
pub use request::{Label, Request};
pub use results::ShoeRecord;

use std::path::Path;
use std::sync::Arc;

/// Builder for a shoe crawl over any `Browser`
#[derive(Debug, Clone, Default)]
pub struct ShoeCrawl {
    input: CrawlerInput,
}

impl ShoeCrawl {
    /// Create a builder with the default input
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, input: CrawlerInput) -> Self {
        self.input = input;
        self
    }

    /// Load the input from a JSON file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self, error::ConfigError> {
        let input = CrawlerInput::from_file(path)?;
        Ok(self.with_input(input))
    }

    /// Load the input from a JSON string
    pub fn with_config_str(self, json: &str) -> Result<Self, error::ConfigError> {
        let input = CrawlerInput::from_json(json)?;
        Ok(self.with_input(input))
    }

    /// Replace the seed URLs
    pub fn with_seed_urls(mut self, urls: Vec<String>) -> Self {
        self.input.seed_urls = urls;
        self
    }

    /// Set the request budget (0 = unbounded)
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.input.max_items = max_items;
        self
    }

    /// Set the number of concurrent workers
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.input.max_concurrency = max_concurrency;
        self
    }

    pub fn input(&self) -> &CrawlerInput {
        &self.input
    }

    /// Seed requests from the input
    pub fn seeds(&self) -> Result<Vec<Request>, CrawlError> {
        Ok(self
            .input
            .seed_requests()
            .map_err(error::ConfigError::from)?)
    }

    /// Build a crawler routed through the shop handlers, writing records to `sink`
    pub fn build<B: Browser>(
        &self,
        browser: B,
        sink: Arc<dyn RecordSink>,
    ) -> Result<Crawler<B>, CrawlError> {
        let registry = routes::router::<B::Page>()?;
        let filter = self.input.url_filter()?;
        Crawler::new(browser, registry, sink, filter, self.input.crawler_options())
    }
}
