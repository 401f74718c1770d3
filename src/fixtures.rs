//! Offline shop used by the handler and crawl tests.

use crate::browser::snapshot::SnapshotSite;
use crate::config::{CrawlerInput, InteractionConfig};

pub(crate) const HOME_URL: &str = "https://example.com/";
pub(crate) const LISTING_URL: &str = "https://example.com/w/mens-shoes";

const CONSENT: &str = r#"<div class="consent" data-appear-after-ms="20">
    <button data-testid="dialog-accept-button">Accept All</button>
</div>"#;

pub(crate) fn home_page() -> String {
    format!(
        r#"<html><head><title>Shop</title></head><body>
        {CONSENT}
        <nav>
          <a data-testid="link" href="/w/mens-shoes">All shoes</a>
          <a data-testid="link" href="/w/mens-clothing">All clothing</a>
          <a data-testid="link" href="/w/mens-shoes#top">All shoes</a>
        </nav>
        </body></html>"#
    )
}

/// Listing with three products spread over lazily loaded batches
pub(crate) fn listing_page() -> String {
    format!(
        r#"<html><body>
        {CONSENT}
        <section class="grid">
          <div class="product-card"><a class="product-card__link-overlay" href="/t/alpha">Alpha</a></div>
          <div data-lazy-batch="1">
            <div class="product-card"><a class="product-card__link-overlay" href="/t/bravo">Bravo</a></div>
            <div class="product-card"><a class="product-card__link-overlay" href="/t/alpha?">Alpha again</a></div>
          </div>
          <div data-lazy-batch="2">
            <div class="product-card"><a class="product-card__link-overlay" href="/t/charlie">Charlie</a></div>
            <div class="product-card"><a class="product-card__link-overlay" href="https://ads.example.net/t/promo">Promo</a></div>
          </div>
        </section>
        </body></html>"#
    )
}

pub(crate) fn detail_page(title: &str, price: Option<&str>, description: &str) -> String {
    let price = price
        .map(|p| {
            format!(
                r#"<div data-testid="currentPrice-container">{p}</div>
                   <div data-testid="currentPrice-container">{p} (member)</div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body>
        <h1 data-testid="product_title">{title}</h1>
        {price}
        <div data-testid="product-description"><p>{description}</p></div>
        </body></html>"#
    )
}

/// Home -> one listing -> three products (one without a price, one redirected)
pub(crate) fn shop_site() -> SnapshotSite {
    SnapshotSite::new()
        .with_page(HOME_URL, home_page())
        .with_page(LISTING_URL, listing_page())
        .with_page("https://example.com/w/mens-clothing", "<html><body>Clothing</body></html>")
        .with_page(
            "https://example.com/t/alpha",
            detail_page("Alpha Runner", Some("$120"), "Light and fast."),
        )
        .with_page(
            "https://example.com/t/bravo",
            detail_page("Bravo Trail", None, "Grippy outsole."),
        )
        .with_redirect("https://example.com/t/charlie", "https://example.com/t/charlie-2")
        .with_page(
            "https://example.com/t/charlie-2",
            detail_page("Charlie Court", Some("$95"), "Classic leather."),
        )
}

/// Site with `count` detail pages at /t/p0, /t/p1, ...
pub(crate) fn detail_site(count: usize) -> SnapshotSite {
    (0..count).fold(SnapshotSite::new(), |site, i| {
        site.with_page(
            &format!("https://example.com/t/p{i}"),
            detail_page(&format!("Product {i}"), Some("$50"), "Plain."),
        )
    })
}

pub(crate) fn fast_interaction() -> InteractionConfig {
    InteractionConfig {
        consent_timeout_ms: 60,
        network_idle_timeout_ms: 50,
        scroll_settle_ms: 10,
        stable_scroll_rounds: 2,
        max_scroll_rounds: 20,
        max_scroll_secs: 5,
    }
}

pub(crate) fn test_input() -> CrawlerInput {
    CrawlerInput {
        seed_urls: vec![HOME_URL.to_string()],
        max_concurrency: 4,
        request_handler_timeout_secs: 10,
        navigation_timeout_secs: 5,
        interaction: fast_interaction(),
        ..CrawlerInput::default()
    }
}
