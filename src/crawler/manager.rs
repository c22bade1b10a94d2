//! Crawl manager - lifecycle and worker pool of one project
//!
//! A `CrawlManager` owns everything a running crawl shares: the work queue, the
//! stop signal, the crawl budget and the pool of worker tasks. It exposes three
//! operations (`start`, `stop`, `status`) and is safe to call from any task.
//!
//! Lifecycle: `Idle -> Running -> Stopping -> Stopped`, and `Stopped -> Running`
//! again on the next `start`. A run stops itself when the crawl limit is reached
//! or the frontier is exhausted; `stop` ends it early. Either way, URLs still in
//! the work queue are returned to the frontier store so a later run resumes them.

use crate::config::CrawlerConfig;
use crate::crawler::queue::WorkQueue;
use crate::crawler::spider::{Spider, VisitStatus};
use crate::project::CrawlProject;
use crate::robots::{self, RobotsPolicy};
use crate::storage::{FrontierCounts, FrontierStore, Partition, StoreResult};
use crate::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::task::{JoinHandle, JoinSet};

/// Lifecycle state of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Never started
    Idle,
    Running,
    /// Stop signalled, workers winding down
    Stopping,
    Stopped,
}

impl CrawlState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called
    Requested,
    /// The project's visited count reached its crawl limit
    LimitReached,
    /// No pending URLs were left and no worker was busy
    FrontierExhausted,
    /// Every worker task ended without a stop signal
    WorkersFailed,
}

/// Result of `CrawlManager::start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new run began with `queued` URLs in the work queue
    Started { project: String, queued: usize },
    /// The project was already running; nothing changed
    AlreadyRunning { project: String },
}

/// Snapshot of a crawl, returned by `status` and `stop`
#[derive(Debug, Clone)]
pub struct CrawlStatus {
    pub project: String,
    pub state: CrawlState,
    /// True while workers may still be active (`Running` or `Stopping`)
    pub running: bool,
    pub visited_count: usize,
    pub pending_count: usize,
    /// URLs waiting in the in-process work queue
    pub queued_count: usize,
    pub in_flight_count: usize,
    pub live_workers: usize,
    pub stop_reason: Option<StopReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Timeline {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    stop_reason: Option<StopReason>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One-shot stop flag; only the first trigger records a reason
#[derive(Debug, Default)]
struct StopSignal {
    reason: OnceLock<StopReason>,
}

impl StopSignal {
    fn trigger(&self, reason: StopReason) -> bool {
        self.reason.set(reason).is_ok()
    }

    fn is_set(&self) -> bool {
        self.reason.get().is_some()
    }

    fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }
}

/// Visits a run may still perform before reaching the crawl limit
///
/// A worker reserves a slot before visiting and releases it if the visit did not
/// mark anything visited, so the visited count never overshoots the limit.
#[derive(Debug)]
struct Budget {
    limit: usize,
    used: AtomicUsize,
}

impl Budget {
    fn new(limit: usize, already_visited: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(already_visited),
        }
    }

    fn try_reserve(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        self.used.fetch_sub(1, Ordering::SeqCst);
    }

    fn exhausted(&self) -> bool {
        self.used.load(Ordering::SeqCst) >= self.limit
    }
}

/// Decrements the live worker count when a worker task ends, even by panic
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn register(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State shared by the workers of one run
struct RunContext {
    project: Arc<CrawlProject>,
    store: Arc<dyn FrontierStore>,
    robots: Arc<RobotsPolicy>,
    spider: Spider,
    queue: Arc<WorkQueue>,
    stop: StopSignal,
    budget: Budget,
    dequeue_wait: Duration,
    state: Arc<watch::Sender<CrawlState>>,
    timeline: Arc<Mutex<Timeline>>,
}

impl RunContext {
    fn name(&self) -> &str {
        self.project.name()
    }

    /// Triggers the stop signal; the first caller logs and moves the state to `Stopping`
    fn signal_stop(&self, reason: StopReason) {
        if !self.stop.trigger(reason) {
            return;
        }

        match reason {
            StopReason::Requested => tracing::info!("[{}] Stop requested", self.name()),
            StopReason::LimitReached => tracing::info!(
                "[{}] Crawl limit of {} reached, stopping",
                self.name(),
                self.project.crawl_limit()
            ),
            StopReason::FrontierExhausted => {
                tracing::info!("[{}] Frontier exhausted, stopping", self.name())
            }
            StopReason::WorkersFailed => {
                tracing::error!("[{}] All workers ended unexpectedly", self.name())
            }
        }

        self.state.send_if_modified(|state| {
            if *state == CrawlState::Running {
                *state = CrawlState::Stopping;
                true
            } else {
                false
            }
        });
        self.queue.wake_all();
    }

    /// Loads pending URLs from the store into the work queue
    ///
    /// URLs robots.txt forbids stay pending but are never dispatched.
    fn refill_from_store(&self) -> StoreResult<usize> {
        let pending = self.store.pending(self.name())?;
        Ok(self.queue.extend(
            pending
                .into_iter()
                .filter(|url| self.robots.can_fetch(url)),
        ))
    }

    /// Decides whether an idle worker should exit
    ///
    /// The crawl is finished only when the queue is empty, no URL is in flight,
    /// and the store has no dispatchable pending URL.
    fn try_finish(&self) -> bool {
        if self.stop.is_set() {
            return true;
        }
        if !self.queue.is_idle() {
            return false;
        }

        match self.refill_from_store() {
            Ok(0) => {}
            Ok(found) => {
                tracing::debug!("[{}] Picked up {} pending URLs", self.name(), found);
                return false;
            }
            Err(e) => {
                tracing::error!("[{}] Frontier check failed: {}", self.name(), e);
                return false;
            }
        }

        if self.queue.is_idle() {
            self.signal_stop(StopReason::FrontierExhausted);
            true
        } else {
            false
        }
    }

    /// Returns a URL to the queue after a store failure, once the back-off elapses
    async fn defer(&self, url: String) {
        tokio::time::sleep(self.dequeue_wait).await;
        self.queue.give_back(url);
    }

    /// Handles one dequeued URL; returns false when the worker should exit
    async fn process(&self, worker_id: usize, url: String) -> bool {
        let name = self.name();

        match self.store.contains(name, Partition::Visited, &url) {
            Ok(true) => {
                tracing::debug!("[{}] worker-{} dropping visited {}", name, worker_id, url);
                self.queue.complete(&url);
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("[{}] Frontier lookup failed for {}: {}", name, url, e);
                self.defer(url).await;
                return true;
            }
        }

        if !self.budget.try_reserve() {
            self.queue.give_back(url);
            self.signal_stop(StopReason::LimitReached);
            return false;
        }

        match self.spider.visit(&url).await {
            Ok(outcome) => {
                match outcome.status {
                    VisitStatus::Visited => {
                        let found = outcome.accepted.len();
                        self.queue.extend(outcome.accepted);
                        match &outcome.error {
                            Some(e) => tracing::warn!("[{}] {} failed: {}", name, url, e),
                            None => tracing::info!(
                                "[{}] worker-{} crawled {} \"{}\" ({} new links)",
                                name,
                                worker_id,
                                url,
                                outcome.title.as_deref().unwrap_or(""),
                                found
                            ),
                        }
                        if self.budget.exhausted() {
                            self.signal_stop(StopReason::LimitReached);
                        }
                    }
                    VisitStatus::AlreadyVisited | VisitStatus::Disallowed => {
                        self.budget.release();
                    }
                }
                self.queue.complete(&url);
            }
            Err(e) => {
                self.budget.release();
                tracing::error!("[{}] Frontier update failed for {}: {}", name, url, e);
                self.defer(url).await;
            }
        }

        true
    }
}

async fn run_worker(id: usize, ctx: Arc<RunContext>, _live: LiveWorker) {
    tracing::debug!("[{}] worker-{} started", ctx.name(), id);

    loop {
        if ctx.stop.is_set() {
            break;
        }

        let Some(url) = ctx.queue.pop_timeout(ctx.dequeue_wait).await else {
            if ctx.try_finish() {
                break;
            }
            continue;
        };

        if ctx.stop.is_set() {
            ctx.queue.give_back(url);
            break;
        }

        if !ctx.process(id, url).await {
            break;
        }
    }

    tracing::debug!("[{}] worker-{} exiting", ctx.name(), id);
}

/// Waits for every worker, then returns unfinished URLs to the store
async fn supervise(ctx: Arc<RunContext>, mut workers: JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!("[{}] Worker task failed: {}", ctx.name(), e);
        }
    }

    if !ctx.stop.is_set() {
        ctx.signal_stop(StopReason::WorkersFailed);
    }

    let leftover = ctx.queue.drain();
    if !leftover.is_empty() {
        match ctx.store.requeue(ctx.name(), &leftover) {
            Ok(added) => tracing::debug!(
                "[{}] Returned {} unfinished URLs to the frontier ({} new)",
                ctx.name(),
                leftover.len(),
                added
            ),
            Err(e) => tracing::error!(
                "[{}] Failed to return {} URLs to the frontier: {}",
                ctx.name(),
                leftover.len(),
                e
            ),
        }
    }

    {
        let mut timeline = lock(&ctx.timeline);
        timeline.finished_at = Some(Utc::now());
        timeline.stop_reason = ctx.stop.reason();
    }
    ctx.state.send_replace(CrawlState::Stopped);

    match ctx.store.counts(ctx.name()) {
        Ok(counts) => tracing::info!(
            "[{}] Crawl stopped: {} visited, {} pending",
            ctx.name(),
            counts.visited,
            counts.pending
        ),
        Err(e) => tracing::info!("[{}] Crawl stopped (counts unavailable: {})", ctx.name(), e),
    }
}

struct RunHandle {
    ctx: Arc<RunContext>,
    supervisor: JoinHandle<()>,
}

/// Lifecycle owner of one project's crawl
pub struct CrawlManager {
    project: Arc<CrawlProject>,
    store: Arc<dyn FrontierStore>,
    client: Client,
    fetch_timeout: Duration,
    robots_timeout: Duration,
    dequeue_wait: Duration,
    robots: OnceCell<Arc<RobotsPolicy>>,
    queue: Arc<WorkQueue>,
    state: Arc<watch::Sender<CrawlState>>,
    timeline: Arc<Mutex<Timeline>>,
    live_workers: Arc<AtomicUsize>,
    last_counts: Mutex<FrontierCounts>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
}

impl CrawlManager {
    /// Creates an idle manager
    ///
    /// # Arguments
    ///
    /// * `project` - The validated project to crawl
    /// * `settings` - Timeouts and queue wait shared by all projects
    /// * `store` - Frontier store shared by all projects
    /// * `client` - HTTP client shared by all projects
    pub fn new(
        project: CrawlProject,
        settings: &CrawlerConfig,
        store: Arc<dyn FrontierStore>,
        client: Client,
    ) -> Self {
        let (state, _) = watch::channel(CrawlState::Idle);
        Self {
            project: Arc::new(project),
            store,
            client,
            fetch_timeout: settings.fetch_timeout(),
            robots_timeout: settings.robots_timeout(),
            dequeue_wait: settings.dequeue_wait(),
            robots: OnceCell::new(),
            queue: Arc::new(WorkQueue::new()),
            state: Arc::new(state),
            timeline: Arc::new(Mutex::new(Timeline::default())),
            live_workers: Arc::new(AtomicUsize::new(0)),
            last_counts: Mutex::new(FrontierCounts::default()),
            run: tokio::sync::Mutex::new(None),
        }
    }

    pub fn project(&self) -> &CrawlProject {
        &self.project
    }

    pub fn state(&self) -> CrawlState {
        *self.state.borrow()
    }

    /// Loads robots.txt on first use; later runs reuse the same policy
    async fn robots(&self) -> Arc<RobotsPolicy> {
        let policy = self
            .robots
            .get_or_init(|| async {
                let name = self.project.name();
                let policy =
                    robots::load_for(&self.client, self.project.seed_url(), self.robots_timeout)
                        .await;
                if policy.is_fallback() {
                    tracing::warn!("[{}] No usable robots.txt, all URLs allowed", name);
                } else {
                    tracing::info!("[{}] Loaded robots.txt", name);
                }
                Arc::new(policy)
            })
            .await;
        Arc::clone(policy)
    }

    /// Starts crawling the project
    ///
    /// Seeds the frontier if the project has never been seen, loads pending URLs
    /// into the work queue and spawns the workers. Returns immediately; the crawl
    /// proceeds in the background.
    ///
    /// # Returns
    ///
    /// * `Ok(StartOutcome::Started)` - A new run began
    /// * `Ok(StartOutcome::AlreadyRunning)` - Nothing changed
    /// * `Err(CrawlError)` - The frontier store failed; the manager stays as it was
    pub async fn start(&self) -> Result<StartOutcome> {
        let name = self.project.name();
        let mut run = self.run.lock().await;

        if self.state() == CrawlState::Running {
            tracing::info!("[{}] Already crawling", name);
            return Ok(StartOutcome::AlreadyRunning {
                project: name.to_string(),
            });
        }

        // A run that stopped itself may still be returning URLs to the store
        if let Some(previous) = run.take() {
            previous.supervisor.await?;
        }

        let robots = self.robots().await;

        if self.store.seed_if_empty(name, self.project.seed_url())? {
            tracing::info!("[{}] Seeded frontier with {}", name, self.project.seed_url());
        }
        let counts = self.store.counts(name)?;

        let ctx = Arc::new(RunContext {
            project: Arc::clone(&self.project),
            store: Arc::clone(&self.store),
            robots: Arc::clone(&robots),
            spider: Spider::new(
                Arc::clone(&self.project),
                Arc::clone(&self.store),
                robots,
                self.client.clone(),
                self.fetch_timeout,
            ),
            queue: Arc::clone(&self.queue),
            stop: StopSignal::default(),
            budget: Budget::new(self.project.crawl_limit(), counts.visited),
            dequeue_wait: self.dequeue_wait,
            state: Arc::clone(&self.state),
            timeline: Arc::clone(&self.timeline),
        });
        let queued = ctx.refill_from_store()?;

        *lock(&self.timeline) = Timeline {
            started_at: Some(Utc::now()),
            ..Timeline::default()
        };
        self.state.send_replace(CrawlState::Running);

        let mut workers = JoinSet::new();
        for id in 1..=self.project.thread_count() {
            let live = LiveWorker::register(&self.live_workers);
            workers.spawn(run_worker(id, Arc::clone(&ctx), live));
        }
        let supervisor = tokio::spawn(supervise(Arc::clone(&ctx), workers));
        *run = Some(RunHandle { ctx, supervisor });

        tracing::info!(
            "[{}] Crawl started: {} workers, {} URLs queued, {} already visited",
            name,
            self.project.thread_count(),
            queued,
            counts.visited
        );

        Ok(StartOutcome::Started {
            project: name.to_string(),
            queued,
        })
    }

    /// Stops the crawl and waits for its workers to exit
    ///
    /// Idempotent: stopping an idle or stopped crawl only reports its status.
    /// When this returns, every URL that was queued but not visited is pending
    /// in the frontier store.
    pub async fn stop(&self) -> Result<CrawlStatus> {
        let mut run = self.run.lock().await;

        if let Some(handle) = run.take() {
            handle.ctx.signal_stop(StopReason::Requested);
            handle.supervisor.await?;
        }

        Ok(self.status())
    }

    /// Reports progress without waiting on the workers
    pub fn status(&self) -> CrawlStatus {
        let name = self.project.name();
        let state = self.state();

        let counts = match self.store.counts(name) {
            Ok(counts) => {
                *lock(&self.last_counts) = counts;
                counts
            }
            Err(e) => {
                tracing::warn!("[{}] Frontier counts unavailable: {}", name, e);
                *lock(&self.last_counts)
            }
        };

        let timeline = lock(&self.timeline).clone();

        CrawlStatus {
            project: name.to_string(),
            state,
            running: matches!(state, CrawlState::Running | CrawlState::Stopping),
            visited_count: counts.visited,
            pending_count: counts.pending,
            queued_count: self.queue.len(),
            in_flight_count: self.queue.in_flight(),
            live_workers: self.live_workers.load(Ordering::SeqCst),
            stop_reason: timeline.stop_reason,
            started_at: timeline.started_at,
            finished_at: timeline.finished_at,
        }
    }

    /// Waits until the current run (if any) has fully stopped
    pub async fn wait_until_stopped(&self) {
        let mut state = self.state.subscribe();
        // An error means the sender is gone, which cannot happen while `self` lives
        let _ = state
            .wait_for(|s| matches!(s, CrawlState::Idle | CrawlState::Stopped))
            .await;
    }
}
