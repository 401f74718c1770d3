//! Best-effort interactions and field reads on a rendered page.
//!
//! Missing elements are an expected outcome on this site (consent dialogs
//! only show up for new sessions, some products have no price block), so
//! absence is reported through return values and never as an error.

use crate::browser::{Page, Presence};
use crate::error::{ExtractError, PageError};
use crate::utils::squish_whitespace;
use std::time::{Duration, Instant};
use url::Url;

const VISIBILITY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How `read_field` treats several matching elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Read the first match
    First,
    /// Expect at most one match
    Strict,
}

/// An anchor found on the page, before filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    pub text: String,
    pub href: String,
}

/// Bounds for `infinite_scroll`
#[derive(Debug, Clone, Copy)]
pub struct ScrollOptions {
    /// Network quiescence wait after each scroll
    pub settle_timeout: Duration,
    /// Consecutive rounds without growth before the page counts as fully loaded
    pub stable_rounds: u32,
    pub max_rounds: u32,
    pub max_duration: Duration,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            settle_timeout: Duration::from_secs(2),
            stable_rounds: 2,
            max_rounds: 200,
            max_duration: Duration::from_secs(120),
        }
    }
}

/// Why `infinite_scroll` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStop {
    /// No new content appeared
    Settled,
    MaxRounds,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollReport {
    pub rounds: u32,
    pub final_height: u64,
    pub stop: ScrollStop,
}

/// Wait up to `timeout` for an element matching `selector` to become visible
pub async fn wait_for_visible<P: Page>(
    page: &mut P,
    selector: &str,
    timeout: Duration,
) -> Result<Presence<P::Element>, PageError> {
    let deadline = Instant::now() + timeout;
    loop {
        for element in page.find_elements(selector).await? {
            if page.is_visible(&element).await? {
                return Ok(Presence::Found(element));
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(Presence::Absent);
        }
        tokio::time::sleep(VISIBILITY_POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Click the element if it becomes visible within `timeout`.
///
/// Returns true when the element was found and clicked. Nothing here is
/// reported as an error: lookup and click failures are logged and yield false.
pub async fn dismiss_if_present<P: Page>(page: &mut P, selector: &str, timeout: Duration) -> bool {
    let element = match wait_for_visible(page, selector, timeout).await {
        Ok(Presence::Found(element)) => element,
        Ok(Presence::Absent) => {
            ::log::info!("No '{}' element appeared, proceeding without it", selector);
            return false;
        }
        Err(e) => {
            ::log::warn!("Looking for '{}' failed, proceeding without it: {}", selector, e);
            return false;
        }
    };

    match page.click(&element).await {
        Ok(()) => {
            ::log::info!("Found and clicked '{}'", selector);
            true
        }
        Err(e) => {
            ::log::warn!("Failed to click '{}': {}", selector, e);
            false
        }
    }
}

/// Whitespace-normalized text of the matching element, or an empty string if nothing matches
pub async fn read_field<P: Page>(
    page: &mut P,
    selector: &str,
    mode: ReadMode,
) -> Result<String, ExtractError> {
    let elements = page.find_elements(selector).await?;
    if mode == ReadMode::Strict && elements.len() > 1 {
        return Err(ExtractError::Ambiguous {
            selector: selector.to_string(),
            count: elements.len(),
        });
    }

    match elements.first() {
        Some(element) => Ok(squish_whitespace(&page.text_content(element).await?)),
        None => {
            ::log::debug!("Field '{}' is absent, using empty string", selector);
            Ok(String::new())
        }
    }
}

/// Resolved targets of the anchors matching `selector` that pass `filter`.
///
/// Anchors without an href, or with one that does not resolve against
/// `base`, are skipped.
pub async fn collect_links<P, F>(
    page: &mut P,
    selector: &str,
    base: &Url,
    filter: F,
) -> Result<Vec<Url>, PageError>
where
    P: Page,
    F: Fn(&LinkCandidate) -> bool + Send,
{
    let mut links = Vec::new();
    for element in page.find_elements(selector).await? {
        let Some(href) = page.attribute(&element, "href").await? else {
            continue;
        };
        let candidate = LinkCandidate {
            text: squish_whitespace(&page.text_content(&element).await?),
            href,
        };
        if !filter(&candidate) {
            continue;
        }
        match base.join(candidate.href.trim()) {
            Ok(url) => links.push(url),
            Err(e) => ::log::debug!("Skipping unresolvable href '{}': {}", candidate.href, e),
        }
    }
    Ok(links)
}

/// Filter for `collect_links` matching the exact (whitespace-normalized) link text
pub fn text_equals(expected: &str) -> impl Fn(&LinkCandidate) -> bool + Send {
    let expected = squish_whitespace(expected);
    move |candidate| candidate.text == expected
}

/// Scroll until the document stops growing
pub async fn infinite_scroll<P: Page>(
    page: &mut P,
    options: &ScrollOptions,
) -> Result<ScrollReport, PageError> {
    let started = Instant::now();
    let mut height = page.document_height().await?;
    let mut stable = 0;
    let mut rounds = 0;

    let stop = loop {
        if stable >= options.stable_rounds.max(1) {
            break ScrollStop::Settled;
        }
        if rounds >= options.max_rounds {
            break ScrollStop::MaxRounds;
        }
        if started.elapsed() >= options.max_duration {
            break ScrollStop::Timeout;
        }

        page.scroll_to_bottom().await?;
        rounds += 1;
        if !page.wait_network_idle(options.settle_timeout).await? {
            ::log::debug!("Network still busy after scroll round {}", rounds);
        }

        let new_height = page.document_height().await?;
        if new_height > height {
            ::log::trace!("Page grew from {} to {} after scroll {}", height, new_height, rounds);
            height = new_height;
            stable = 0;
        } else {
            stable += 1;
        }
    };

    ::log::debug!(
        "Infinite scroll stopped after {} rounds ({:?}), height {}",
        rounds,
        stop,
        height
    );
    Ok(ScrollReport {
        rounds,
        final_height: height,
        stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::snapshot::{SnapshotBrowser, SnapshotPage, SnapshotSite};

    const PRODUCT: &str = r#"
        <html><body>
          <div id="consent"><button data-testid="dialog-accept-button">Accept</button></div>
          <h1 data-testid="product_title">  Air Max
             90 </h1>
          <div data-testid="currentPrice-container">$130</div>
          <div data-testid="currentPrice-container">$110</div>
          <nav>
            <a data-testid="link" href="/w/mens-shoes">All shoes</a>
            <a data-testid="link" href="/w/mens-clothing">All clothing</a>
            <a data-testid="link">All shoes</a>
            <a data-testid="link" href="https://other.test/w/shoes"> All
               shoes </a>
          </nav>
          <button id="late" data-appear-after-ms="30">Late</button>
        </body></html>"#;

    async fn page() -> (SnapshotBrowser, SnapshotPage) {
        let browser = SnapshotBrowser::new(
            SnapshotSite::new().with_page("https://shop.test/t/air-max-90", PRODUCT),
        );
        let mut page = browser.page();
        page.navigate(&Url::parse("https://shop.test/t/air-max-90").unwrap())
            .await
            .unwrap();
        (browser, page)
    }

    #[tokio::test]
    async fn test_dismiss_clicks_visible_element() {
        let (browser, mut page) = page().await;
        let dismissed = dismiss_if_present(
            &mut page,
            "[data-testid=\"dialog-accept-button\"]",
            Duration::from_millis(200),
        )
        .await;
        assert!(dismissed);
        assert_eq!(browser.stats().clicks(), 1);
    }

    #[tokio::test]
    async fn test_dismiss_tolerates_absent_element() {
        let (browser, mut page) = page().await;
        let started = Instant::now();
        let dismissed =
            dismiss_if_present(&mut page, "#no-such-dialog", Duration::from_millis(150)).await;
        assert!(!dismissed);
        assert!(started.elapsed() >= Duration::from_millis(150));
        assert_eq!(browser.stats().clicks(), 0);
    }

    #[tokio::test]
    async fn test_dismiss_tolerates_invalid_selector() {
        let (_browser, mut page) = page().await;
        assert!(!dismiss_if_present(&mut page, "button[", Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_for_late_element() {
        let (_browser, mut page) = page().await;
        let presence = wait_for_visible(&mut page, "#late", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(presence.is_found());

        let presence = wait_for_visible(&mut page, "#never", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(!presence.is_found());
    }

    #[tokio::test]
    async fn test_read_field() {
        let (_browser, mut page) = page().await;
        assert_eq!(
            read_field(&mut page, "[data-testid=\"product_title\"]", ReadMode::Strict)
                .await
                .unwrap(),
            "Air Max 90"
        );
        assert_eq!(
            read_field(&mut page, "[data-testid=\"currentPrice-container\"]", ReadMode::First)
                .await
                .unwrap(),
            "$130"
        );
        assert_eq!(
            read_field(&mut page, "[data-testid=\"product-description\"]", ReadMode::Strict)
                .await
                .unwrap(),
            ""
        );
    }

    #[tokio::test]
    async fn test_read_field_strict_rejects_multiple_matches() {
        let (_browser, mut page) = page().await;
        let err = read_field(&mut page, "[data-testid=\"currentPrice-container\"]", ReadMode::Strict)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Ambiguous { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_collect_links_by_text() {
        let (_browser, mut page) = page().await;
        let base = Url::parse("https://shop.test/t/air-max-90").unwrap();
        let links = collect_links(
            &mut page,
            "[data-testid=\"link\"]",
            &base,
            text_equals("All shoes"),
        )
        .await
        .unwrap();
        assert_eq!(
            links.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec!["https://shop.test/w/mens-shoes", "https://other.test/w/shoes"]
        );
    }

    #[tokio::test]
    async fn test_infinite_scroll_loads_every_batch() {
        let html = r#"<html><body>
            <a class="card" href="/t/1">1</a>
            <a class="card" data-lazy-batch="1" href="/t/2">2</a>
            <a class="card" data-lazy-batch="2" href="/t/3">3</a>
            <a class="card" data-lazy-batch="3" href="/t/4">4</a>
        </body></html>"#;
        let browser = SnapshotBrowser::new(SnapshotSite::new().with_page("https://shop.test/w", html));
        let mut page = browser.page();
        page.navigate(&Url::parse("https://shop.test/w").unwrap()).await.unwrap();

        let report = infinite_scroll(&mut page, &ScrollOptions::default()).await.unwrap();
        assert_eq!(report.stop, ScrollStop::Settled);
        assert_eq!(report.final_height, 4000);
        // Three growing rounds plus two stable ones
        assert_eq!(report.rounds, 5);
        assert_eq!(page.find_elements("a.card").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_infinite_scroll_is_bounded() {
        let cards: String = (1..=50)
            .map(|i| format!("<a class=\"card\" data-lazy-batch=\"{i}\" href=\"/t/{i}\">{i}</a>"))
            .collect();
        let browser = SnapshotBrowser::new(
            SnapshotSite::new().with_page("https://shop.test/w", format!("<html><body>{cards}</body></html>")),
        );
        let mut page = browser.page();
        page.navigate(&Url::parse("https://shop.test/w").unwrap()).await.unwrap();

        let options = ScrollOptions {
            max_rounds: 10,
            ..ScrollOptions::default()
        };
        let report = infinite_scroll(&mut page, &options).await.unwrap();
        assert_eq!(report.stop, ScrollStop::MaxRounds);
        assert_eq!(report.rounds, 10);
    }
}
