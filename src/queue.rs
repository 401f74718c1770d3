//! Shared request queue.
//!
//! The queue is the only crawl state mutated by several workers at once. All
//! mutation happens under one mutex so dedup and the request budget hold
//! under concurrent `enqueue`/`dequeue`.

use crate::request::Request;
use std::collections::{HashSet, VecDeque};
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Request>,
    seen: HashSet<String>,
    dispatched: usize,
    in_flight: usize,
}

impl QueueState {
    fn budget_reached(&self, max_requests: Option<usize>) -> bool {
        max_requests.is_some_and(|max| self.dispatched >= max)
    }
}

/// FIFO request queue with dedup by normalized URL and a dispatch budget
#[derive(Debug)]
pub struct RequestQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    max_requests: Option<usize>,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RequestQueue {
    /// Create a queue that dispatches at most `max_requests` requests (0 = unbounded)
    pub fn new(max_requests: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            max_requests: (max_requests > 0).then_some(max_requests),
        }
    }

    pub fn max_requests(&self) -> Option<usize> {
        self.max_requests
    }

    /// Admit a request unless its normalized URL was seen before
    pub async fn enqueue(&self, request: Request) -> bool {
        let admitted = {
            let mut state = self.state.lock().await;
            Self::admit(&mut state, request)
        };
        if admitted {
            self.notify.notify_waiters();
        }
        admitted
    }

    /// Admit requests in order, silently dropping duplicates. Returns how many were admitted.
    pub async fn enqueue_many(&self, requests: impl IntoIterator<Item = Request>) -> usize {
        let admitted = {
            let mut state = self.state.lock().await;
            requests
                .into_iter()
                .map(|request| Self::admit(&mut state, request))
                .filter(|admitted| *admitted)
                .count()
        };
        if admitted > 0 {
            self.notify.notify_waiters();
        }
        admitted
    }

    fn admit(state: &mut QueueState, request: Request) -> bool {
        if !state.seen.insert(request.unique_key().to_string()) {
            ::log::trace!("Skipping already seen request: {}", request.unique_key());
            return false;
        }
        ::log::debug!("Queued {}", request);
        state.pending.push_back(request);
        true
    }

    /// Take the head of the queue, or `None` when it is empty or the budget is spent
    pub async fn dequeue(&self) -> Option<Request> {
        let mut state = self.state.lock().await;
        self.take_next(&mut state)
    }

    fn take_next(&self, state: &mut QueueState) -> Option<Request> {
        if state.budget_reached(self.max_requests) {
            return None;
        }
        let request = state.pending.pop_front()?;
        state.dispatched += 1;
        state.in_flight += 1;
        if state.budget_reached(self.max_requests) {
            ::log::info!(
                "Request budget of {} reached",
                self.max_requests.unwrap_or_default()
            );
            // Wake idle workers so they can observe the exhausted budget
            self.notify.notify_waiters();
        }
        Some(request)
    }

    /// Wait for the next request.
    ///
    /// Returns `None` once the crawl is finished: either the budget is spent, or
    /// nothing is pending and no in-flight request can enqueue more work.
    pub async fn next(&self) -> Option<Request> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(request) = self.take_next(&mut state) {
                    return Some(request);
                }
                if state.budget_reached(self.max_requests) || state.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark one dispatched request as finished
    pub async fn complete(&self) {
        {
            let mut state = self.state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// True when nothing is pending or the budget is spent
    pub async fn is_exhausted(&self) -> bool {
        let state = self.state.lock().await;
        state.pending.is_empty() || state.budget_reached(self.max_requests)
    }

    pub async fn budget_reached(&self) -> bool {
        self.state.lock().await.budget_reached(self.max_requests)
    }

    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Number of requests handed out so far
    pub async fn dispatched(&self) -> usize {
        self.state.lock().await.dispatched
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Label;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(url: &str) -> Request {
        Request::from_url(url, Label::Default).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_is_dequeued_once() {
        let queue = RequestQueue::default();
        assert!(queue.enqueue(request("https://nike.com/t/a")).await);
        assert!(!queue.enqueue(request("https://nike.com/t/a#reviews")).await);
        assert!(!queue.enqueue(request("https://NIKE.com/t/a/")).await);

        assert!(queue.dequeue().await.is_some());
        queue.complete().await;
        assert!(queue.dequeue().await.is_none());

        // Already dispatched URLs stay seen
        assert!(!queue.enqueue(request("https://nike.com/t/a")).await);
    }

    #[tokio::test]
    async fn test_enqueue_many_preserves_order() {
        let queue = RequestQueue::default();
        let admitted = queue
            .enqueue_many(vec![
                request("https://nike.com/1"),
                request("https://nike.com/2"),
                request("https://nike.com/1"),
                request("https://nike.com/3"),
            ])
            .await;
        assert_eq!(admitted, 3);

        let mut order = Vec::new();
        while let Some(r) = queue.dequeue().await {
            order.push(r.url().path().to_string());
        }
        assert_eq!(order, vec!["/1", "/2", "/3"]);
    }

    #[tokio::test]
    async fn test_budget_limits_dispatch() {
        let queue = RequestQueue::new(2);
        queue
            .enqueue_many((0..5).map(|i| request(&format!("https://nike.com/t/{i}"))))
            .await;

        assert!(queue.dequeue().await.is_some());
        assert!(!queue.is_exhausted().await);
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
        assert!(queue.is_exhausted().await);
        assert!(queue.budget_reached().await);
        assert_eq!(queue.dispatched().await, 2);
        assert_eq!(queue.pending_len().await, 3);
    }

    #[tokio::test]
    async fn test_zero_budget_is_unbounded() {
        let queue = RequestQueue::new(0);
        assert_eq!(queue.max_requests(), None);
        queue
            .enqueue_many((0..10).map(|i| request(&format!("https://nike.com/t/{i}"))))
            .await;
        let mut count = 0;
        while queue.dequeue().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 10);
        assert!(!queue.budget_reached().await);
    }

    #[tokio::test]
    async fn test_next_returns_none_when_drained() {
        let queue = RequestQueue::default();
        assert!(queue.next().await.is_none());

        queue.enqueue(request("https://nike.com/")).await;
        assert!(queue.next().await.is_some());
        assert_eq!(queue.in_flight().await, 1);
        queue.complete().await;
        assert_eq!(queue.in_flight().await, 0);
        assert!(queue.next().await.is_none());
    }

    #[tokio::test]
    async fn test_next_waits_for_in_flight_work() {
        let queue = Arc::new(RequestQueue::default());
        queue.enqueue(request("https://nike.com/")).await;
        let _seed = queue.next().await.unwrap();

        // A second worker waits while the seed is still being processed
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.enqueue(request("https://nike.com/w/mens-shoes")).await;
        queue.complete().await;

        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
        assert_eq!(next.unwrap().url().path(), "/w/mens-shoes");
    }

    #[tokio::test]
    async fn test_next_wakes_waiters_when_last_request_completes() {
        let queue = Arc::new(RequestQueue::default());
        queue.enqueue(request("https://nike.com/")).await;
        let _seed = queue.next().await.unwrap();

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.complete().await;

        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake up")
            .unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_enqueue_keeps_dedup() {
        let queue = Arc::new(RequestQueue::default());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut admitted = 0;
                for i in 0..50 {
                    if queue.enqueue(request(&format!("https://nike.com/t/{i}"))).await {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }
        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(queue.pending_len().await, 50);
    }
}
