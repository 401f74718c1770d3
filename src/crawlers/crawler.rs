use super::state::{CrawlState, StateCell, StopHandle, StopMode, StopSignal};
use super::stats::{CrawlStats, FinishReason, StatsCollector};
use crate::browser::{Browser, Page};
use crate::config::CrawlerOptions;
use crate::context::CrawlContext;
use crate::dataset::RecordSink;
use crate::error::{CrawlError, HandlerError, PageError};
use crate::filter::UrlFilter;
use crate::queue::RequestQueue;
use crate::registry::{Handler, HandlerRegistry};
use crate::request::Request;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::task::JoinSet;

/// State shared by every worker of one crawl
struct Shared<B: Browser> {
    browser: Arc<B>,
    registry: HandlerRegistry<B::Page>,
    queue: Arc<RequestQueue>,
    sink: Arc<dyn RecordSink>,
    filter: UrlFilter,
    options: CrawlerOptions,
    stats: StatsCollector,
}

/// How processing of one request ended
enum Outcome {
    Finished,
    Failed(HandlerError),
    Panicked(String),
    TimedOut,
    Cancelled,
}

/// Worker pool that drains the request queue through the handler registry
pub struct Crawler<B: Browser> {
    shared: Arc<Shared<B>>,
    state: StateCell,
    stop_handle: StopHandle,
    stop_signal: StopSignal,
    started: AtomicBool,
}

impl<B: Browser> Crawler<B> {
    /// Build a crawler. Fails if the registry has no default handler.
    pub fn new(
        browser: B,
        registry: HandlerRegistry<B::Page>,
        sink: Arc<dyn RecordSink>,
        filter: UrlFilter,
        options: CrawlerOptions,
    ) -> Result<Self, CrawlError> {
        registry.validate()?;
        let (stop_handle, stop_signal) = StopSignal::channel();

        Ok(Self {
            shared: Arc::new(Shared {
                browser: Arc::new(browser),
                registry,
                queue: Arc::new(RequestQueue::new(options.max_requests)),
                sink,
                filter,
                options,
                stats: StatsCollector::default(),
            }),
            state: StateCell::new(),
            stop_handle,
            stop_signal,
            started: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> CrawlState {
        self.state.get()
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.shared.queue
    }

    pub fn browser(&self) -> &Arc<B> {
        &self.shared.browser
    }

    /// Handle for stopping the crawl from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Seed the queue and process requests until the crawl terminates
    pub async fn run(&self, seeds: Vec<Request>) -> Result<CrawlStats, CrawlError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(CrawlError::AlreadyStarted);
        }
        let start_time = Instant::now();
        let shared = &self.shared;

        let submitted = seeds.len();
        let admitted = shared.queue.enqueue_many(seeds).await;
        ::log::info!("Seeded queue with {} of {} requests", admitted, submitted);

        self.state.transition(CrawlState::Running);
        let mut stop = self.stop_signal.clone();
        self.enter_stop_state(stop.mode());

        let num_workers = shared.options.max_concurrency.max(1);
        let mut workers = JoinSet::new();
        for worker_id in 0..num_workers {
            ::log::trace!("Spawning worker {}", worker_id);
            workers.spawn(worker_processing_loop(
                worker_id,
                Arc::clone(shared),
                self.stop_signal.clone(),
            ));
        }

        let mut completed_workers = 0;
        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {
                        completed_workers += 1;
                        ::log::debug!(
                            "Worker completed. {} of {} workers done.",
                            completed_workers,
                            num_workers
                        );
                    }
                    Some(Err(e)) => {
                        // The worker died with its in-flight request
                        ::log::error!("Worker task failed: {}", e);
                        shared.stats.record_failed();
                        shared.queue.complete().await;
                    }
                },
                mode = stop.changed() => self.enter_stop_state(mode),
            }
        }

        let finish_reason = match self.stop_signal.mode() {
            StopMode::Abort => FinishReason::Aborted,
            StopMode::Drain => FinishReason::Shutdown,
            StopMode::Continue => {
                if shared.queue.budget_reached().await && shared.queue.pending_len().await > 0 {
                    FinishReason::BudgetExhausted
                } else {
                    FinishReason::QueueDrained
                }
            }
        };

        shared.browser.close().await;
        self.state.transition(CrawlState::Terminated);

        let stats = shared.stats.snapshot(
            shared.queue.dispatched().await,
            finish_reason,
            start_time.elapsed(),
        );
        ::log::info!(
            "Crawling complete ({}) - {} requests finished, {} failed, {} records in {:.2} seconds",
            finish_reason,
            stats.requests_finished,
            stats.requests_failed,
            stats.records_emitted,
            stats.elapsed.as_secs_f64()
        );
        Ok(stats)
    }

    fn enter_stop_state(&self, mode: StopMode) {
        match mode {
            StopMode::Continue => {}
            StopMode::Drain => {
                ::log::info!("Shutdown requested, finishing in-flight requests");
                self.state.transition(CrawlState::Draining);
            }
            StopMode::Abort => {
                ::log::warn!("Abort requested, cancelling in-flight requests");
                self.state.transition(CrawlState::Aborted);
            }
        }
    }
}

/// Main processing loop for a worker
///
/// Pulls requests until the queue is finished or a stop is requested.
async fn worker_processing_loop<B: Browser>(
    worker_id: usize,
    shared: Arc<Shared<B>>,
    mut stop: StopSignal,
) {
    ::log::debug!("Worker {} starting processing loop", worker_id);

    loop {
        let next = tokio::select! {
            biased;
            _ = stop.stopping() => None,
            request = shared.queue.next() => request,
        };
        let Some(request) = next else {
            break;
        };

        process_request(worker_id, &shared, &mut stop, request).await;
        shared.queue.complete().await;
    }

    ::log::debug!(
        "Worker {} completed processing loop - no more requests to process",
        worker_id
    );
}

/// Runs one request through its handler on a fresh page.
///
/// Every failure is contained here, panics included: the page goes back to
/// the browser and the request is dropped without retry.
async fn process_request<B: Browser>(
    worker_id: usize,
    shared: &Shared<B>,
    stop: &mut StopSignal,
    mut request: Request,
) {
    let handler = match shared.registry.resolve(&request) {
        Ok(handler) => handler,
        Err(e) => {
            ::log::error!("Worker {} dropping {}: {}", worker_id, request, e);
            shared.stats.record_failed();
            return;
        }
    };

    let mut page = match shared.browser.open_page().await {
        Ok(page) => page,
        Err(e) => {
            ::log::error!("Worker {} could not open a page for {}: {}", worker_id, request, e);
            shared.stats.record_failed();
            return;
        }
    };

    let worker_start = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = stop.aborted() => Outcome::Cancelled,
        result = tokio::time::timeout(
            shared.options.request_handler_timeout,
            AssertUnwindSafe(run_handler(
                worker_id,
                shared,
                handler.as_ref(),
                &mut request,
                &mut page,
            ))
            .catch_unwind(),
        ) => match result {
            Ok(Ok(Ok(()))) => Outcome::Finished,
            Ok(Ok(Err(e))) => Outcome::Failed(e),
            Ok(Err(panic)) => Outcome::Panicked(panic_message(&*panic)),
            Err(_) => Outcome::TimedOut,
        },
    };

    shared
        .browser
        .release_page(page, matches!(outcome, Outcome::Finished))
        .await;

    match outcome {
        Outcome::Finished => {
            shared.stats.record_finished();
            ::log::debug!(
                "Worker {} processed {} in {:.2} seconds",
                worker_id,
                request,
                worker_start.elapsed().as_secs_f64()
            );
        }
        Outcome::Failed(e) => {
            shared.stats.record_failed();
            ::log::error!("Worker {} failed to process {}: {}", worker_id, request.url(), e);
        }
        Outcome::Panicked(message) => {
            shared.stats.record_failed();
            ::log::error!(
                "Worker {} handler panicked on {}: {}",
                worker_id,
                request.url(),
                message
            );
        }
        Outcome::TimedOut => {
            shared.stats.record_failed();
            ::log::error!(
                "Worker {} timed out after {:?} processing {}",
                worker_id,
                shared.options.request_handler_timeout,
                request.url()
            );
        }
        Outcome::Cancelled => {
            shared.stats.record_cancelled();
            ::log::info!("Worker {} cancelled {}", worker_id, request.url());
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Navigates to the request's URL and hands the page to the handler
async fn run_handler<B: Browser>(
    worker_id: usize,
    shared: &Shared<B>,
    handler: &dyn Handler<B::Page>,
    request: &mut Request,
    page: &mut B::Page,
) -> Result<(), HandlerError> {
    let navigation_timeout = shared.options.navigation_timeout;
    let loaded_url = match tokio::time::timeout(navigation_timeout, page.navigate(request.url())).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(PageError::Navigation {
                url: request.url().to_string(),
                reason: format!("timed out after {:?}", navigation_timeout),
            }
            .into());
        }
    };
    if loaded_url != *request.url() {
        ::log::debug!("Worker {}: {} redirected to {}", worker_id, request.url(), loaded_url);
    }
    request.set_loaded_url(loaded_url);

    let mut ctx = CrawlContext::new(
        request,
        page,
        worker_id,
        &shared.queue,
        shared.sink.as_ref(),
        &shared.filter,
        &shared.options.interaction,
        &shared.stats.emitted,
    );
    handler.handle(&mut ctx).await
}
