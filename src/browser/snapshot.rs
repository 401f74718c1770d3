//! Offline pages served from pre-rendered HTML.
//!
//! Elements are resolved with `scraper`. A few data attributes stand in for
//! dynamic behaviour a real browser would show:
//!
//! * `hidden` or `style="display: none"` marks an element (and its subtree) invisible
//! * `data-appear-after-ms="N"` keeps an element invisible for N ms after navigation
//! * `data-lazy-batch="N"` keeps an element out of the DOM until the page was scrolled N times

use super::{Browser, Page};
use crate::error::{ConfigError, PageError};
use crate::filter::normalize_url;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use url::Url;

const MAX_REDIRECTS: usize = 5;
const VIEWPORT_HEIGHT: u64 = 1000;

#[derive(Debug, Clone)]
enum SnapshotEntry {
    Document(Arc<str>),
    Redirect(Url),
}

/// In-memory site: normalized URL -> HTML document or redirect
#[derive(Debug, Clone, Default)]
pub struct SnapshotSite {
    entries: HashMap<String, SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    pages: Vec<ManifestPage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPage {
    url: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    redirect: Option<String>,
}

impl SnapshotSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page, replacing any previous entry for the same URL
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        match Url::parse(url) {
            Ok(url) => {
                let html: String = html.into();
                self.entries
                    .insert(key(&url), SnapshotEntry::Document(Arc::from(html)));
            }
            Err(e) => ::log::warn!("Ignoring snapshot page with invalid URL {}: {}", url, e),
        }
        self
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        match (Url::parse(from), Url::parse(to)) {
            (Ok(from), Ok(to)) => {
                self.entries.insert(key(&from), SnapshotEntry::Redirect(to));
            }
            _ => ::log::warn!("Ignoring snapshot redirect {} -> {}", from, to),
        }
        self
    }

    /// Load a site from a directory holding `manifest.json` and the HTML files it names
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let manifest: Manifest =
            serde_json::from_str(&std::fs::read_to_string(dir.join("manifest.json"))?)?;

        let mut site = Self::new();
        for page in manifest.pages {
            match (page.file, page.redirect) {
                (Some(file), _) => {
                    let html = std::fs::read_to_string(dir.join(&file))?;
                    site = site.with_page(&page.url, html);
                }
                (None, Some(target)) => site = site.with_redirect(&page.url, &target),
                (None, None) => {
                    ::log::warn!("Snapshot manifest entry {} has no file or redirect", page.url)
                }
            }
        }
        ::log::info!("Loaded {} snapshot pages from {}", site.len(), dir.display());
        Ok(site)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn resolve(&self, url: &Url) -> Result<(Url, Arc<str>), PageError> {
        let mut current = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            match self.entries.get(&key(&current)) {
                Some(SnapshotEntry::Document(html)) => return Ok((current, Arc::clone(html))),
                Some(SnapshotEntry::Redirect(target)) => current = target.clone(),
                None => {
                    return Err(PageError::Navigation {
                        url: url.to_string(),
                        reason: format!("404 Not Found ({})", current),
                    });
                }
            }
        }
        Err(PageError::Navigation {
            url: url.to_string(),
            reason: "too many redirects".to_string(),
        })
    }
}

fn key(url: &Url) -> String {
    normalize_url(url).to_string()
}

/// Counters shared between a snapshot browser and its pages
#[derive(Debug, Default)]
pub struct SnapshotStats {
    opened: AtomicUsize,
    released: AtomicUsize,
    discarded: AtomicUsize,
    clicks: AtomicUsize,
    navigations: AtomicUsize,
}

impl SnapshotStats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Pages handed back to the browser, healthy or not
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Pages handed back as unhealthy
    pub fn discarded(&self) -> usize {
        self.discarded.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> usize {
        self.navigations.load(Ordering::SeqCst)
    }
}

/// Browser serving pages from a `SnapshotSite`
#[derive(Debug, Clone)]
pub struct SnapshotBrowser {
    site: Arc<SnapshotSite>,
    stats: Arc<SnapshotStats>,
}

impl SnapshotBrowser {
    pub fn new(site: SnapshotSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(SnapshotStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SnapshotStats> {
        Arc::clone(&self.stats)
    }

    /// A page that is not tracked by the browser counters
    pub fn page(&self) -> SnapshotPage {
        SnapshotPage::new(Arc::clone(&self.site), Arc::clone(&self.stats))
    }
}

#[async_trait]
impl Browser for SnapshotBrowser {
    type Page = SnapshotPage;

    async fn open_page(&self) -> Result<SnapshotPage, PageError> {
        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.page())
    }

    async fn release_page(&self, _page: SnapshotPage, healthy: bool) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        if !healthy {
            self.stats.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Owned copy of an element matched in a snapshot document
#[derive(Debug, Clone)]
pub struct SnapshotElement {
    text: String,
    attributes: HashMap<String, String>,
    hidden: bool,
    appear_after: Option<Duration>,
}

#[derive(Debug)]
struct LoadedDocument {
    url: Url,
    html: Arc<str>,
    loaded_at: Instant,
    max_batch: u32,
}

/// A page over one snapshot document at a time
#[derive(Debug)]
pub struct SnapshotPage {
    site: Arc<SnapshotSite>,
    stats: Arc<SnapshotStats>,
    document: Option<LoadedDocument>,
    scrolls: u32,
}

impl SnapshotPage {
    fn new(site: Arc<SnapshotSite>, stats: Arc<SnapshotStats>) -> Self {
        Self {
            site,
            stats,
            document: None,
            scrolls: 0,
        }
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.document.as_ref().map(|d| &d.url)
    }

    pub fn scrolls(&self) -> u32 {
        self.scrolls
    }
}

fn parse_selector(selector: &str) -> Result<Selector, PageError> {
    Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))
}

/// Walks the element and its ancestors
fn lineage<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    std::iter::once(element).chain(element.ancestors().filter_map(ElementRef::wrap))
}

fn lazy_batch(element: ElementRef<'_>) -> u32 {
    lineage(element)
        .filter_map(|e| e.value().attr("data-lazy-batch"))
        .filter_map(|b| b.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    lineage(element).any(|e| {
        let value = e.value();
        value.attr("hidden").is_some()
            || value.attr("style").is_some_and(|style| {
                let style: String = style.chars().filter(|c| !c.is_whitespace()).collect();
                style.to_ascii_lowercase().contains("display:none")
            })
    })
}

fn appear_after(element: ElementRef<'_>) -> Option<Duration> {
    lineage(element)
        .filter_map(|e| e.value().attr("data-appear-after-ms"))
        .filter_map(|ms| ms.trim().parse::<u64>().ok())
        .max()
        .map(Duration::from_millis)
}

fn max_batch(html: &str) -> u32 {
    let Ok(selector) = Selector::parse("[data-lazy-batch]") else {
        return 0;
    };
    let doc = Html::parse_document(html);
    doc.select(&selector).map(lazy_batch).max().unwrap_or(0)
}

fn query(html: &str, selector: &str, scrolls: u32) -> Result<Vec<SnapshotElement>, PageError> {
    let selector = parse_selector(selector)?;
    let doc = Html::parse_document(html);
    let elements = doc
        .select(&selector)
        .filter(|e| lazy_batch(*e) <= scrolls)
        .map(|e| SnapshotElement {
            text: e.text().collect::<Vec<_>>().join(" "),
            attributes: e
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            hidden: is_hidden(e),
            appear_after: appear_after(e),
        })
        .collect();
    Ok(elements)
}

#[async_trait]
impl Page for SnapshotPage {
    type Element = SnapshotElement;

    async fn navigate(&mut self, url: &Url) -> Result<Url, PageError> {
        self.stats.navigations.fetch_add(1, Ordering::SeqCst);
        let (loaded_url, html) = self.site.resolve(url)?;
        self.document = Some(LoadedDocument {
            max_batch: max_batch(&html),
            url: loaded_url.clone(),
            html,
            loaded_at: Instant::now(),
        });
        self.scrolls = 0;
        Ok(loaded_url)
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<SnapshotElement>, PageError> {
        match &self.document {
            Some(document) => query(&document.html, selector, self.scrolls),
            None => {
                // Blank page
                parse_selector(selector)?;
                Ok(Vec::new())
            }
        }
    }

    async fn is_visible(&mut self, element: &SnapshotElement) -> Result<bool, PageError> {
        if element.hidden {
            return Ok(false);
        }
        let elapsed = self
            .document
            .as_ref()
            .map(|d| d.loaded_at.elapsed())
            .unwrap_or_default();
        Ok(element.appear_after.is_none_or(|delay| elapsed >= delay))
    }

    async fn click(&mut self, _element: &SnapshotElement) -> Result<(), PageError> {
        self.stats.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn text_content(&mut self, element: &SnapshotElement) -> Result<String, PageError> {
        Ok(element.text.clone())
    }

    async fn attribute(
        &mut self,
        element: &SnapshotElement,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        Ok(element.attributes.get(name).cloned())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), PageError> {
        self.scrolls += 1;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, PageError> {
        let revealed = self
            .document
            .as_ref()
            .map(|d| self.scrolls.min(d.max_batch))
            .unwrap_or(0);
        Ok(VIEWPORT_HEIGHT * (1 + u64::from(revealed)))
    }

    async fn wait_network_idle(&mut self, _timeout: Duration) -> Result<bool, PageError> {
        Ok(true)
    }
}
