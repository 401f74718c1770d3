//! Handlers for the shop's home → listing → detail topology.

use crate::browser::Page;
use crate::context::CrawlContext;
use crate::error::{HandlerError, RegistryError};
use crate::extract::{self, ReadMode};
use crate::registry::{Handler, HandlerRegistry};
use crate::request::Label;
use crate::results::ShoeRecord;
use crate::utils::test_id;
use async_trait::async_trait;

pub const CONSENT_ACCEPT_TEST_ID: &str = "dialog-accept-button";
pub const NAV_LINK_TEST_ID: &str = "link";
pub const ALL_SHOES_LINK_TEXT: &str = "All shoes";
pub const PRODUCT_CARD_SELECTOR: &str = "a.product-card__link-overlay";
pub const TITLE_TEST_ID: &str = "product_title";
pub const PRICE_TEST_ID: &str = "currentPrice-container";
pub const DESCRIPTION_TEST_ID: &str = "product-description";

/// Registry with the default, listing and detail handlers
pub fn router<P: Page + 'static>() -> Result<HandlerRegistry<P>, RegistryError> {
    let mut registry = HandlerRegistry::new();
    registry
        .register_default(HomeHandler)?
        .register(Label::Listing, ListingHandler)?
        .register(Label::Detail, DetailHandler)?;
    Ok(registry)
}

async fn accept_cookies_if_present<P: Page>(ctx: &mut CrawlContext<'_, P>) -> bool {
    let timeout = ctx.interaction().consent_timeout();
    extract::dismiss_if_present(&mut *ctx.page, &test_id(CONSENT_ACCEPT_TEST_ID), timeout).await
}

/// Seed pages: find the "All shoes" navigation links
pub struct HomeHandler;

#[async_trait]
impl<P: Page> Handler<P> for HomeHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, P>) -> Result<(), HandlerError> {
        ::log::info!("Processing {} ...", ctx.request.url());
        accept_cookies_if_present(ctx).await;

        let base = ctx.loaded_url().clone();
        let links = extract::collect_links(
            &mut *ctx.page,
            &test_id(NAV_LINK_TEST_ID),
            &base,
            extract::text_equals(ALL_SHOES_LINK_TEXT),
        )
        .await?;
        if links.is_empty() {
            ::log::warn!("No '{}' links found on {}", ALL_SHOES_LINK_TEXT, base);
        }

        ctx.enqueue_urls(links, Label::Listing).await;
        Ok(())
    }
}

/// Category listings: load every product card, then queue the detail pages
pub struct ListingHandler;

#[async_trait]
impl<P: Page> Handler<P> for ListingHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, P>) -> Result<(), HandlerError> {
        accept_cookies_if_present(ctx).await;

        let idle_timeout = ctx.interaction().network_idle_timeout();
        if !ctx.page.wait_network_idle(idle_timeout).await? {
            ::log::info!(
                "Network on {} still busy after {:?}, scrolling anyway",
                ctx.request.url(),
                idle_timeout
            );
        }

        let options = ctx.interaction().scroll_options();
        let report = extract::infinite_scroll(&mut *ctx.page, &options).await?;
        ::log::debug!(
            "Listing {} scrolled {} times ({:?})",
            ctx.request.url(),
            report.rounds,
            report.stop
        );

        let queued = ctx.enqueue_links(PRODUCT_CARD_SELECTOR, Label::Detail).await?;
        ::log::info!("Listing {} queued {} new products", ctx.request.url(), queued);
        Ok(())
    }
}

/// Product pages: extract one record
pub struct DetailHandler;

#[async_trait]
impl<P: Page> Handler<P> for DetailHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, P>) -> Result<(), HandlerError> {
        // Cookies can show up here too when a crawl starts from a product URL
        accept_cookies_if_present(ctx).await;

        let page = &mut *ctx.page;
        let title = extract::read_field(page, &test_id(TITLE_TEST_ID), ReadMode::Strict).await?;
        let price = extract::read_field(page, &test_id(PRICE_TEST_ID), ReadMode::First).await?;
        let description =
            extract::read_field(page, &test_id(DESCRIPTION_TEST_ID), ReadMode::Strict).await?;

        let record = ShoeRecord::new(ctx.loaded_url().to_string(), title, price, description);
        ctx.emit(record).await?;
        Ok(())
    }
}
