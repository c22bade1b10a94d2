//! In-process work queue shared by the workers of one crawl
//!
//! The queue also tracks which URLs are in flight. A crawl is idle only when
//! nothing is queued and nothing is in flight, and both facts are read under one
//! lock, so a worker that is about to enqueue new links always keeps the crawl
//! alive.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<String>,
    queued: HashSet<String>,
    in_flight: HashSet<String>,
}

/// FIFO of URLs awaiting a worker
#[derive(Debug, Default)]
pub struct WorkQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // The critical sections never panic; recover the data if one ever did.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a URL unless it is already queued or in flight
    pub fn push(&self, url: String) -> bool {
        let added = {
            let mut inner = self.lock();
            if inner.queued.contains(&url) || inner.in_flight.contains(&url) {
                false
            } else {
                inner.queued.insert(url.clone());
                inner.items.push_back(url);
                true
            }
        };
        if added {
            self.notify.notify_one();
        }
        added
    }

    /// Adds several URLs, returning how many were new to the queue
    pub fn extend<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        urls.into_iter().filter(|url| self.push(url.clone())).count()
    }

    fn try_pop(&self) -> Option<String> {
        let mut inner = self.lock();
        let url = inner.items.pop_front()?;
        inner.queued.remove(&url);
        inner.in_flight.insert(url.clone());
        Some(url)
    }

    /// Takes the next URL, waiting at most `wait` for one to arrive
    ///
    /// A returned URL is in flight until it is passed to `complete` or `give_back`.
    pub async fn pop_timeout(&self, wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            if let Some(url) = self.try_pop() {
                return Some(url);
            }
            if timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    /// Marks an in-flight URL as finished
    pub fn complete(&self, url: &str) {
        let idle = {
            let mut inner = self.lock();
            inner.in_flight.remove(url);
            inner.items.is_empty() && inner.in_flight.is_empty()
        };
        if idle {
            self.notify.notify_waiters();
        }
    }

    /// Returns an unfinished in-flight URL to the front of the queue
    pub fn give_back(&self, url: String) {
        {
            let mut inner = self.lock();
            inner.in_flight.remove(&url);
            if inner.queued.insert(url.clone()) {
                inner.items.push_front(url);
            }
        }
        self.notify.notify_one();
    }

    /// True when nothing is queued and nothing is in flight
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.items.is_empty() && inner.in_flight.is_empty()
    }

    /// Wakes every waiting worker
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Removes and returns every queued and in-flight URL
    pub fn drain(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.queued.clear();
        let mut urls: Vec<String> = inner.items.drain(..).collect();
        urls.extend(inner.in_flight.drain());
        urls
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }
}
