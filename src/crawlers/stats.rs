use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Why a crawl reached `Terminated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Nothing left to process
    QueueDrained,
    /// The configured request budget was spent
    BudgetExhausted,
    /// Stopped by `StopHandle::shutdown`
    Shutdown,
    /// Stopped by `StopHandle::abort`
    Aborted,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FinishReason::QueueDrained => "queue drained",
            FinishReason::BudgetExhausted => "request budget exhausted",
            FinishReason::Shutdown => "shutdown requested",
            FinishReason::Aborted => "aborted",
        };
        f.write_str(reason)
    }
}

/// Summary of a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub requests_dispatched: usize,
    pub requests_finished: usize,
    pub requests_failed: usize,
    /// Requests cancelled by an abort
    pub requests_cancelled: usize,
    pub records_emitted: usize,
    pub finish_reason: FinishReason,
    pub elapsed: Duration,
}

/// Counters updated by the workers while the crawl runs
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    pub(crate) finished: AtomicUsize,
    pub(crate) failed: AtomicUsize,
    pub(crate) cancelled: AtomicUsize,
    pub(crate) emitted: AtomicUsize,
}

impl StatsCollector {
    pub(crate) fn record_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(
        &self,
        requests_dispatched: usize,
        finish_reason: FinishReason,
        elapsed: Duration,
    ) -> CrawlStats {
        CrawlStats {
            requests_dispatched,
            requests_finished: self.finished.load(Ordering::SeqCst),
            requests_failed: self.failed.load(Ordering::SeqCst),
            requests_cancelled: self.cancelled.load(Ordering::SeqCst),
            records_emitted: self.emitted.load(Ordering::SeqCst),
            finish_reason,
            elapsed,
        }
    }
}
