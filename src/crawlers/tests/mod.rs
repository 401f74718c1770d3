
use crate::browser::snapshot::{SnapshotBrowser, SnapshotPage};
use crate::config::CrawlerOptions;
use crate::context::CrawlContext;
use crate::error::HandlerError;
use crate::fixtures;
use crate::registry::Handler;
use crate::request::{Label, Request};
use crate::results::ShoeRecord;
use async_trait::async_trait;
use std::time::Duration;

/// Optionally emits a record, then sleeps
pub(super) struct SleepyHandler {
    pub(super) delay: Duration,
    pub(super) emit_first: bool,
}

#[async_trait]
impl Handler<SnapshotPage> for SleepyHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, SnapshotPage>) -> Result<(), HandlerError> {
        if self.emit_first {
            let record = ShoeRecord::new(
                ctx.loaded_url().to_string(),
                "partial".to_string(),
                String::new(),
                String::new(),
            );
            ctx.emit(record).await?;
        }
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Always fails
pub(super) struct BrokenHandler;

#[async_trait]
impl Handler<SnapshotPage> for BrokenHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, SnapshotPage>) -> Result<(), HandlerError> {
        Err(HandlerError::Other(format!("unexpected layout on {}", ctx.request.url())))
    }
}

/// Panics on `/t/p0`, records every other page
pub(super) struct PanickyHandler;

#[async_trait]
impl Handler<SnapshotPage> for PanickyHandler {
    async fn handle(&self, ctx: &mut CrawlContext<'_, SnapshotPage>) -> Result<(), HandlerError> {
        let url = ctx.loaded_url().to_string();
        if url.ends_with("/t/p0") {
            let sizes: Vec<usize> = Vec::new();
            let _ = sizes[0];
        }
        ctx.emit(ShoeRecord::new(url, "ok".to_string(), String::new(), String::new()))
            .await?;
        Ok(())
    }
}

pub(super) fn detail_requests(urls: &[&str]) -> Vec<Request> {
    urls.iter()
        .map(|url| Request::from_url(url, Label::Detail).unwrap())
        .collect()
}

pub(super) fn product_urls(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("https://example.com/t/p{i}")).collect()
}

pub(super) fn options(max_concurrency: usize, max_requests: usize) -> CrawlerOptions {
    CrawlerOptions {
        max_concurrency,
        max_requests,
        navigation_timeout: Duration::from_secs(5),
        request_handler_timeout: Duration::from_secs(10),
        interaction: fixtures::fast_interaction(),
    }
}

pub(super) fn detail_browser(count: usize) -> SnapshotBrowser {
    SnapshotBrowser::new(fixtures::detail_site(count))
}
