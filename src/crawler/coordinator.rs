//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Popping tasks from the bounded frontier
//! - Fetching, extracting and filtering each page
//! - Quota-aware admission of records and their push to the sink
//! - Enqueuing follow links and pagination continuations
//! - Sequential or bounded-pool scheduling, cancellation and the run summary

use crate::config::{seed_tasks, validate, Config, CrawlConfig, FollowLinkPolicy, SchedulingMode};
use crate::crawler::extractor::{Extractor, QuotesExtractor};
use crate::crawler::fetcher::{FetchErrorKind, FetchPolicy, Fetcher, ReqwestTransport};
use crate::crawler::frontier::{Frontier, PushOutcome};
use crate::crawler::proxy::{proxy_supplier_from_config, ProxySupplier};
use crate::crawler::task::{CrawlTask, TaskRole};
use crate::output::{sink_from_config, Sink};
use crate::state::{RunState, TaskState};
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Orchestration settings resolved from the `[crawl]` section
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Number of records to collect
    pub wanted: usize,

    /// Page-depth ceiling
    pub max_depth: u32,

    pub mode: SchedulingMode,

    /// Pool size; ignored in sequential mode
    pub workers: usize,

    pub frontier_capacity: usize,

    pub follow_link_policy: FollowLinkPolicy,

    /// Wall-clock limit for the whole run
    pub deadline: Option<Duration>,
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            wanted: config.results_wanted as usize,
            max_depth: config.max_pages,
            mode: config.mode,
            workers: config.workers.max(1) as usize,
            frontier_capacity: config.frontier_capacity as usize,
            follow_link_policy: config.follow_link_policy,
            deadline: config.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

/// Counters shared by all workers of a run
#[derive(Debug, Default)]
struct RunStats {
    pages_fetched: AtomicUsize,
    fetch_failures: AtomicUsize,
    duplicate_urls: AtomicUsize,
    duplicate_records: AtomicUsize,
    tasks_dropped: AtomicUsize,
}

impl RunStats {
    fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Outcome of a completed (or stopped) run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Records pushed to the sink
    pub saved: usize,

    /// Records the run was asked for
    pub wanted: usize,

    /// Pages fetched successfully
    pub pages_fetched: usize,

    /// Tasks whose fetch exhausted every attempt
    pub fetch_failures: usize,

    /// Tasks skipped because their URL had already been processed
    pub duplicate_urls: usize,

    /// Records filtered out by fingerprint
    pub duplicate_records: usize,

    /// Tasks dropped because the frontier was full
    pub tasks_dropped: usize,

    /// True if a stop signal or the deadline ended the run early
    pub cancelled: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }

    /// True if the run stopped because the quota was reached
    pub fn quota_met(&self) -> bool {
        self.saved >= self.wanted
    }
}

/// Result of asking the work queue for a task
enum Next {
    Task(CrawlTask),
    /// Frontier is empty but other workers may still enqueue
    Wait,
    /// Frontier is empty and nothing is in flight
    Done,
}

struct QueueInner {
    frontier: Frontier,
    in_flight: usize,
}

/// Frontier shared between workers, with in-flight tracking for termination
struct WorkQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl WorkQueue {
    fn new(frontier: Frontier) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frontier,
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_next(&self) -> Next {
        let mut inner = self.lock();
        match inner.frontier.pop() {
            Some(task) => {
                inner.in_flight += 1;
                Next::Task(task)
            }
            None if inner.in_flight == 0 => Next::Done,
            None => Next::Wait,
        }
    }

    fn push(&self, task: CrawlTask) -> PushOutcome {
        let outcome = self.lock().frontier.push(task);
        if outcome.is_accepted() {
            self.notify.notify_waiters();
        }
        outcome
    }

    /// Marks one popped task as finished
    fn finish(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    fn len(&self) -> usize {
        self.lock().frontier.len()
    }
}

/// Everything a worker needs, shared across the pool
struct CrawlContext {
    settings: CrawlSettings,
    fetcher: Fetcher,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn Sink>,
    state: RunState,
    stats: RunStats,
}

/// Main crawler coordinator
///
/// A coordinator drives a single run: its [`RunState`] is not reset between
/// calls to [`Coordinator::run`].
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator from its collaborators
    pub fn new(
        settings: CrawlSettings,
        fetcher: Fetcher,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        let state = RunState::new(settings.wanted);
        Self {
            ctx: Arc::new(CrawlContext {
                settings,
                fetcher,
                extractor,
                sink,
                state,
                stats: RunStats::default(),
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a coordinator wired to the reqwest transport, the configured
    /// proxies, the quotes extractor and the configured sink
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to build the HTTP client or open the sink
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        let policy = FetchPolicy::from(&config.fetch);
        let transport = Arc::new(ReqwestTransport::new(policy.attempt_timeout)?);
        let proxies: Arc<dyn ProxySupplier> = Arc::from(proxy_supplier_from_config(&config.proxy));
        let fetcher = Fetcher::new(transport, proxies, policy);

        let search_author = config.seeds.search_author.trim();
        let extractor = Arc::new(QuotesExtractor::new(
            (!search_author.is_empty()).then_some(search_author),
        ));

        let sink = sink_from_config(&config.output)?;

        Ok(Self::new(
            CrawlSettings::from(&config.crawl),
            fetcher,
            extractor,
            sink,
        ))
    }

    /// Uses `token` as the external stop signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &RunState {
        &self.ctx.state
    }

    /// Flushes and closes the sink
    pub async fn close(&self) -> Result<(), CrawlError> {
        self.ctx.sink.close().await?;
        Ok(())
    }

    /// Runs the crawl loop until the frontier drains, the quota is met or
    /// the run is stopped
    ///
    /// Per-task failures are logged and counted; only a sink failure ends
    /// the run with an error.
    pub async fn run(&self, seeds: Vec<CrawlTask>) -> Result<RunSummary, CrawlError> {
        let started_at = Utc::now();
        let settings = &self.ctx.settings;

        let run_token = self.cancel.child_token();
        if let Some(deadline) = settings.deadline {
            spawn_deadline(deadline, run_token.clone());
        }

        let queue = Arc::new(WorkQueue::new(Frontier::with_seeds(
            settings.frontier_capacity,
            seeds,
        )));

        tracing::info!(
            "Starting {:?} crawl: {} seed task(s), {} record(s) wanted, depth ceiling {}",
            settings.mode,
            queue.len(),
            settings.wanted,
            settings.max_depth
        );

        let outcome = match settings.mode {
            SchedulingMode::Sequential => {
                worker_loop(Arc::clone(&self.ctx), Arc::clone(&queue), run_token.clone(), 0).await
            }
            SchedulingMode::Pool => self.run_pool(&queue, &run_token).await,
        };

        let cancelled = run_token.is_cancelled();
        run_token.cancel();
        outcome?;

        let stats = &self.ctx.stats;
        let summary = RunSummary {
            saved: self.ctx.state.saved_count(),
            wanted: settings.wanted,
            pages_fetched: RunStats::get(&stats.pages_fetched),
            fetch_failures: RunStats::get(&stats.fetch_failures),
            duplicate_urls: RunStats::get(&stats.duplicate_urls),
            duplicate_records: RunStats::get(&stats.duplicate_records),
            tasks_dropped: RunStats::get(&stats.tasks_dropped),
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl finished: {} / {} record(s) saved from {} page(s) in {:.1}s{}",
            summary.saved,
            summary.wanted,
            summary.pages_fetched,
            summary.duration().as_secs_f64(),
            if cancelled { " (stopped early)" } else { "" }
        );

        Ok(summary)
    }

    /// Runs a fixed-size pool of workers over the shared queue
    async fn run_pool(&self, queue: &Arc<WorkQueue>, token: &CancellationToken) -> Result<(), CrawlError> {
        let mut workers = JoinSet::new();
        for id in 0..self.ctx.settings.workers.max(1) {
            workers.spawn(worker_loop(
                Arc::clone(&self.ctx),
                Arc::clone(queue),
                token.clone(),
                id,
            ));
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    token.cancel();
                    Err(CrawlError::Join(e))
                }
            };

            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Pops and processes tasks until the queue is done, the quota is met or
/// the token is cancelled
async fn worker_loop(
    ctx: Arc<CrawlContext>,
    queue: Arc<WorkQueue>,
    cancel: CancellationToken,
    worker: usize,
) -> Result<(), CrawlError> {
    loop {
        if cancel.is_cancelled() {
            tracing::debug!("Worker {} stopping: run cancelled", worker);
            break;
        }
        if ctx.state.quota_met() {
            tracing::debug!("Worker {} stopping: quota met", worker);
            break;
        }

        // Registered before checking the queue so a push between the check
        // and the wait is not missed.
        let notified = queue.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match queue.try_next() {
            Next::Task(task) => {
                let result = ctx.process_task(&task, &queue, &cancel).await;
                queue.finish();
                if let Err(e) = result {
                    cancel.cancel();
                    return Err(e);
                }
            }
            Next::Wait => {
                tokio::select! {
                    _ = notified => {}
                    _ = cancel.cancelled() => {}
                }
            }
            Next::Done => {
                tracing::debug!("Worker {} stopping: frontier drained", worker);
                break;
            }
        }
    }

    Ok(())
}

impl CrawlContext {
    /// Processes one popped task
    ///
    /// Returns an error only when the sink rejects a batch.
    async fn process_task(
        &self,
        task: &CrawlTask,
        queue: &WorkQueue,
        cancel: &CancellationToken,
    ) -> Result<(), CrawlError> {
        let mut progress = TaskState::Pending;

        if task.depth > self.settings.max_depth {
            tracing::debug!(
                "Skipping {} {} beyond depth ceiling ({} > {})",
                task.role,
                task.url,
                task.depth,
                self.settings.max_depth
            );
            progress.advance(TaskState::Skipped);
            return Ok(());
        }

        if !self.state.should_process_url(task.url.as_str()) {
            RunStats::add(&self.stats.duplicate_urls, 1);
            tracing::debug!("Skipping already processed URL: {}", task.url);
            progress.advance(TaskState::Skipped);
            return Ok(());
        }

        progress = progress.advance(TaskState::Fetching);
        let page = match self.fetcher.fetch(task.url.as_str(), cancel).await {
            Ok(page) => page,
            Err(e) if e.kind == FetchErrorKind::Cancelled => {
                tracing::debug!("Abandoned {}: {}", task.url, e);
                progress.advance(TaskState::Failed);
                return Ok(());
            }
            Err(e) => {
                tracing::error!("Giving up on {} {}: {}", task.role, task.url, e);
                RunStats::add(&self.stats.fetch_failures, 1);
                progress.advance(TaskState::Failed);
                return Ok(());
            }
        };
        RunStats::add(&self.stats.pages_fetched, 1);

        progress = progress.advance(TaskState::Parsing);
        let page_url = Url::parse(&page.final_url).unwrap_or_else(|_| task.url.clone());
        let parsed = self.extractor.parse(&page.body, &page_url, task.role);

        match task.role {
            TaskRole::Listing => {
                progress = progress.advance(TaskState::Enqueuing);
                let found = parsed.follow_links.len();
                let queued = self.enqueue_follow_links(parsed.follow_links, queue);
                tracing::info!(
                    "LISTING {} -> {} detail link(s) found, {} queued",
                    task.url,
                    found,
                    queued
                );
            }
            TaskRole::Detail => {
                progress = progress.advance(TaskState::Filtering);
                let found = parsed.records.len();
                let admission = self.state.admit(parsed.records);
                RunStats::add(&self.stats.duplicate_records, admission.duplicates);

                let saved = admission.accepted.len();
                if saved > 0 {
                    if let Err(source) = self.sink.push(&admission.accepted).await {
                        tracing::error!(
                            "Sink rejected {} record(s) from {}: {}",
                            saved,
                            task.url,
                            source
                        );
                        return Err(CrawlError::Sink {
                            source,
                            lost: saved,
                        });
                    }
                }

                tracing::info!(
                    "DETAIL {} -> {} record(s) found, {} saved (total {}/{})",
                    task.url,
                    found,
                    saved,
                    self.state.saved_count(),
                    self.settings.wanted
                );
                progress = progress.advance(TaskState::Enqueuing);
            }
        }

        if let Some(next) = parsed.next_page {
            if self.state.quota_met() {
                tracing::debug!("Quota met, not following next page {}", next);
            } else if task.depth >= self.settings.max_depth {
                tracing::debug!("Depth ceiling reached, not following next page {}", next);
            } else {
                self.enqueue(task.next_page(next), queue);
            }
        }

        progress.advance(TaskState::Done);
        Ok(())
    }

    fn enqueue(&self, task: CrawlTask, queue: &WorkQueue) -> PushOutcome {
        let outcome = queue.push(task);
        if !outcome.is_accepted() {
            RunStats::add(&self.stats.tasks_dropped, 1);
        }
        outcome
    }

    /// Enqueues follow links as detail tasks under the follow-link policy,
    /// returning how many were accepted
    fn enqueue_follow_links(&self, links: Vec<Url>, queue: &WorkQueue) -> usize {
        let limit = match self.settings.follow_link_policy {
            FollowLinkPolicy::Unbounded => links.len(),
            FollowLinkPolicy::StopWhenQuotaMet if self.state.quota_met() => 0,
            FollowLinkPolicy::StopWhenQuotaMet => links.len(),
            FollowLinkPolicy::CapToRemaining => self.state.remaining(),
        };

        links
            .into_iter()
            .take(limit)
            .map(|link| self.enqueue(CrawlTask::follow(link), queue))
            .filter(PushOutcome::is_accepted)
            .count()
    }
}

/// Cancels `token` once `deadline` has elapsed
fn spawn_deadline(deadline: Duration, token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                tracing::info!("Deadline of {:?} reached, stopping crawl", deadline);
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}

/// Runs a complete crawl operation
///
/// This function:
/// 1. Validates the configuration
/// 2. Derives the seed tasks
/// 3. Builds the coordinator (transport, proxies, extractor, sink)
/// 4. Runs the crawl loop
/// 5. Closes the sink
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `cancel` - External stop signal
///
/// # Example
///
/// ```no_run
/// use quote_crawler::config::load_config;
/// use quote_crawler::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let summary = run_crawl(config, CancellationToken::new()).await?;
/// println!("saved {} quotes", summary.saved);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, cancel: CancellationToken) -> Result<RunSummary, CrawlError> {
    validate(&config)?;
    let seeds = seed_tasks(&config.seeds)?;

    let coordinator = Coordinator::from_config(&config)?.with_cancellation(cancel);
    let result = coordinator.run(seeds).await;
    let closed = coordinator.close().await;

    let summary = result?;
    closed?;
    Ok(summary)
}
