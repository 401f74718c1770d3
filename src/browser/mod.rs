//! Page capability consumed by the crawl core.
//!
//! `Page` is the narrow interface handlers and extraction helpers drive;
//! `Browser` hands out pages and takes them back when a request is done.

pub mod snapshot;
pub mod webdriver;

use crate::error::PageError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Outcome of looking for an element that may legitimately be missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence<E> {
    Found(E),
    Absent,
}

impl<E> Presence<E> {
    pub fn is_found(&self) -> bool {
        matches!(self, Presence::Found(_))
    }

    pub fn found(self) -> Option<E> {
        match self {
            Presence::Found(element) => Some(element),
            Presence::Absent => None,
        }
    }
}

/// A rendered page exclusively owned by one worker
#[async_trait]
pub trait Page: Send + Sync {
    type Element: Send + Sync;

    /// Load `url` and return the URL reached after redirects
    async fn navigate(&mut self, url: &Url) -> Result<Url, PageError>;

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Self::Element>, PageError>;

    async fn find_element(&mut self, selector: &str) -> Result<Option<Self::Element>, PageError> {
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    async fn is_visible(&mut self, element: &Self::Element) -> Result<bool, PageError>;

    async fn click(&mut self, element: &Self::Element) -> Result<(), PageError>;

    async fn text_content(&mut self, element: &Self::Element) -> Result<String, PageError>;

    async fn attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), PageError>;

    /// Current scrollable height of the document, used to detect newly loaded content
    async fn document_height(&mut self) -> Result<u64, PageError>;

    /// Wait until no network activity is observed. Returns false if `timeout` elapsed first.
    async fn wait_network_idle(&mut self, timeout: Duration) -> Result<bool, PageError>;
}

/// Source of pages for the crawler's workers
#[async_trait]
pub trait Browser: Send + Sync + 'static {
    type Page: Page + 'static;

    async fn open_page(&self) -> Result<Self::Page, PageError>;

    /// Take a page back. Unhealthy pages (after a fault or cancellation) must not be reused.
    async fn release_page(&self, page: Self::Page, healthy: bool);

    /// Release every resource still held by the browser
    async fn close(&self) {}
}
