use crate::browser::Page;
use crate::config::InteractionConfig;
use crate::dataset::RecordSink;
use crate::error::{HandlerError, SinkError};
use crate::filter::UrlFilter;
use crate::queue::RequestQueue;
use crate::request::{Label, Request};
use crate::results::ShoeRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Everything a handler can touch while it processes one request
pub struct CrawlContext<'a, P: Page> {
    pub request: &'a Request,
    pub page: &'a mut P,
    pub worker_id: usize,
    queue: &'a RequestQueue,
    sink: &'a dyn RecordSink,
    filter: &'a UrlFilter,
    interaction: &'a InteractionConfig,
    emitted: &'a AtomicUsize,
}

impl<'a, P: Page> CrawlContext<'a, P> {
    pub fn new(
        request: &'a Request,
        page: &'a mut P,
        worker_id: usize,
        queue: &'a RequestQueue,
        sink: &'a dyn RecordSink,
        filter: &'a UrlFilter,
        interaction: &'a InteractionConfig,
        emitted: &'a AtomicUsize,
    ) -> Self {
        Self {
            request,
            page,
            worker_id,
            queue,
            sink,
            filter,
            interaction,
            emitted,
        }
    }

    /// URL the page ended up on, falling back to the requested one
    pub fn loaded_url(&self) -> &Url {
        self.request.loaded_url().unwrap_or(self.request.url())
    }

    pub fn interaction(&self) -> &InteractionConfig {
        self.interaction
    }

    /// Add requests to the crawl queue in order. Returns how many were new.
    pub async fn add_requests(&self, requests: Vec<Request>) -> usize {
        let submitted = requests.len();
        let admitted = self.queue.enqueue_many(requests).await;
        ::log::info!(
            "Worker {} enqueued {} of {} requests from {}",
            self.worker_id,
            admitted,
            submitted,
            self.request.url()
        );
        admitted
    }

    /// Enqueue already resolved URLs under `label`, skipping ones that cannot be crawled
    pub async fn enqueue_urls(&self, urls: impl IntoIterator<Item = Url>, label: Label) -> usize {
        let requests = urls
            .into_iter()
            .filter_map(|url| match Request::new(url, label) {
                Ok(request) => Some(request),
                Err(e) => {
                    ::log::debug!("Skipping discovered link: {}", e);
                    None
                }
            })
            .collect();
        self.add_requests(requests).await
    }

    /// Enqueue the targets of every anchor matching `selector` that the link filter accepts
    pub async fn enqueue_links(&mut self, selector: &str, label: Label) -> Result<usize, HandlerError> {
        let base = self.loaded_url().clone();
        let links = crate::extract::collect_links(&mut *self.page, selector, &base, |_| true).await?;
        let found = links.len();
        let accepted: Vec<Url> = links
            .into_iter()
            .filter(|url| self.filter.should_enqueue(url, &base))
            .collect();
        if accepted.len() < found {
            ::log::debug!(
                "Link filter ({:?}) dropped {} of {} links on {}",
                self.filter.strategy(),
                found - accepted.len(),
                found,
                base
            );
        }
        Ok(self.enqueue_urls(accepted, label).await)
    }

    /// Hand a record to the output sink
    pub async fn emit(&self, record: ShoeRecord) -> Result<(), SinkError> {
        self.sink.emit(record).await?;
        self.emitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
