use std::fmt;
use std::sync::Mutex;
use tokio::sync::watch;

/// Lifecycle of one crawl run.
///
/// `Idle -> Running -> Terminated` on normal completion; `Draining` and
/// `Aborted` are only entered through an explicit stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Idle,
    Running,
    Draining,
    Aborted,
    Terminated,
}

impl CrawlState {
    pub fn can_transition_to(self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Terminated)
                | (Running, Draining)
                | (Running, Aborted)
                | (Running, Terminated)
                | (Draining, Aborted)
                | (Draining, Terminated)
                | (Aborted, Terminated)
        )
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Idle => "idle",
            CrawlState::Running => "running",
            CrawlState::Draining => "draining",
            CrawlState::Aborted => "aborted",
            CrawlState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Current crawl state behind a lock, with transition checking
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<CrawlState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(CrawlState::Idle),
        }
    }

    pub(crate) fn get(&self) -> CrawlState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` if the transition is allowed. Returns whether it happened.
    pub(crate) fn transition(&self, next: CrawlState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.can_transition_to(next) {
            ::log::trace!("Ignoring crawl state change {} -> {}", *state, next);
            return false;
        }
        ::log::debug!("Crawl state {} -> {}", *state, next);
        *state = next;
        true
    }
}

/// What an external stop request asks of the workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopMode {
    Continue,
    /// Finish in-flight requests, dispatch nothing new
    Drain,
    /// Cancel in-flight requests at their next suspension point
    Abort,
}

/// Handle for stopping a running crawl from outside
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<StopMode>,
}

impl StopHandle {
    /// Stop dispatching new requests and let in-flight ones finish
    pub fn shutdown(&self) {
        self.tx.send_if_modified(|mode| {
            if *mode == StopMode::Continue {
                *mode = StopMode::Drain;
                true
            } else {
                false
            }
        });
    }

    /// Cancel in-flight requests. Records already emitted are kept.
    pub fn abort(&self) {
        self.tx.send_if_modified(|mode| {
            if *mode != StopMode::Abort {
                *mode = StopMode::Abort;
                true
            } else {
                false
            }
        });
    }
}

/// Worker-side view of the stop signal
#[derive(Debug, Clone)]
pub(crate) struct StopSignal {
    rx: watch::Receiver<StopMode>,
}

impl StopSignal {
    pub(crate) fn channel() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(StopMode::Continue);
        (StopHandle { tx }, StopSignal { rx })
    }

    pub(crate) fn mode(&self) -> StopMode {
        *self.rx.borrow()
    }

    /// Resolves once any stop (drain or abort) was requested
    pub(crate) async fn stopping(&mut self) {
        self.wait_until(|mode| mode != StopMode::Continue).await
    }

    /// Resolves once an abort was requested
    pub(crate) async fn aborted(&mut self) {
        self.wait_until(|mode| mode == StopMode::Abort).await
    }

    /// Waits for the next stop request and returns the new mode
    pub(crate) async fn changed(&mut self) -> StopMode {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
        *self.rx.borrow_and_update()
    }

    async fn wait_until(&mut self, done: impl Fn(StopMode) -> bool) {
        loop {
            if done(*self.rx.borrow_and_update()) {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped: no stop can ever arrive
                std::future::pending::<()>().await;
            }
        }
    }
}
