//! Crawl orchestrator - the top-level crawl state machine
//!
//! This module drives a crawl through its states:
//!
//! ```text
//! Initializing -> LevelActive -> LevelDraining -> LevelActive ...
//!                      |
//!                      v
//!               LevelAdvancing -> LevelActive (next depth)
//!                      |
//!                      v
//!                  Terminal (Completed | MaxDepthReached | FrontierExhausted | Interrupted)
//! ```
//!
//! A single task owns the frontier and the store. Only one batch is in
//! flight at a time, and its outcomes are applied in batch order once the
//! whole batch has resolved, so the same crawl always admits the same URLs
//! at the same depths.

use crate::config::{compute_config_hash, Config};
use crate::crawler::checkpoint::CheckpointManager;
use crate::crawler::classifier::{Classifier, KeywordClassifier};
use crate::crawler::extractor::{FeatureExtractor, HtmlExtractor};
use crate::crawler::fetcher::{build_http_client, FetchOutcome, FetchedPage};
use crate::crawler::frontier::{Frontier, LevelAdvance};
use crate::crawler::pool::{FetchResult, WorkerPool};
use crate::state::{Classification, UrlStatus};
use crate::storage::{PageResult, PageStore, RunStatus, SqliteStore};
use crate::url::normalize_str;
use crate::{ConfigError, CrawlError, Result};
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The page budget (`max-pages`) was used up; remaining work is checkpointed
    Completed,
    /// The deepest allowed level was fully processed
    MaxDepthReached,
    /// A level produced no new URLs
    FrontierExhausted,
    /// Shutdown was requested; remaining work is checkpointed
    Interrupted,
}

impl TerminalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::MaxDepthReached => "max-depth-reached",
            Self::FrontierExhausted => "frontier-exhausted",
            Self::Interrupted => "interrupted",
        }
    }

    /// Run status recorded for this outcome
    ///
    /// Runs that stopped with work left stay resumable.
    fn run_status(&self) -> RunStatus {
        match self {
            Self::MaxDepthReached | Self::FrontierExhausted => RunStatus::Completed,
            Self::Completed | Self::Interrupted => RunStatus::Interrupted,
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Initializing,
    LevelActive,
    LevelDraining,
    LevelAdvancing,
    Terminal(TerminalState),
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Summary of one crawl invocation
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub run_id: i64,
    pub terminal: TerminalState,
    pub depth_reached: u32,
    pub pages_done: u64,
    pub pages_failed: u64,
    pub elapsed: Duration,
}

/// Main crawl orchestrator
pub struct Orchestrator {
    config: Config,
    seed_url: String,
    run_id: i64,
    state: CrawlState,
    store: Box<dyn PageStore + Send>,
    frontier: Frontier,
    checkpoints: CheckpointManager,
    pool: WorkerPool,
    extractor: Arc<dyn FeatureExtractor>,
    classifier: Arc<dyn Classifier>,
    shutdown: CancellationToken,
    batch: Vec<String>,
    in_progress: Option<BoxStream<'static, FetchResult>>,
    pages_done: u64,
    pages_failed: u64,
    started: Instant,
}

impl Orchestrator {
    /// Opens the SQLite store named in the config and picks the run to work on
    ///
    /// # Errors
    ///
    /// Fails on an inaccessible store, or for any reason [`Self::with_store`] fails.
    pub async fn new(config: Config, fresh: bool) -> Result<Self> {
        let store = SqliteStore::open(Path::new(&config.storage.database_path))?;
        Self::with_store(config, fresh, Box::new(store)).await
    }

    /// Picks the run to work on in `store`
    ///
    /// With `fresh`, every unfinished run is superseded, previous records
    /// are discarded and a new run starts. Otherwise the latest unfinished
    /// run for the same seed is resumed, or a new run is created when there
    /// is none.
    ///
    /// # Errors
    ///
    /// Fails on a missing or invalid seed URL, a store error or an HTTP
    /// client that cannot be built.
    pub async fn with_store(
        config: Config,
        fresh: bool,
        mut store: Box<dyn PageStore + Send>,
    ) -> Result<Self> {
        let raw_seed = config.crawler.seed_url.clone().ok_or_else(|| {
            CrawlError::Config(ConfigError::Validation(
                "a seed URL is required to crawl".to_string(),
            ))
        })?;
        let seed_url = normalize_str(&raw_seed).map_err(|source| CrawlError::InvalidSeed {
            url: raw_seed.clone(),
            source,
        })?;

        let config_hash = compute_config_hash(&config);
        let checkpoint_dir = &config.storage.checkpoint_dir;

        let run_id = if fresh {
            for run in store.resumable_runs()? {
                store.finish_run(run.id, RunStatus::Failed, Some("superseded"))?;
                CheckpointManager::new(checkpoint_dir, run.id).remove().await?;
            }
            store.clear_records()?;
            let id = store.create_run(&seed_url, &config_hash)?;
            info!("Discarded previous crawl data, starting fresh run {}", id);
            id
        } else if let Some(run) = store.latest_resumable_run(&seed_url)? {
            if run.config_hash != config_hash {
                warn!(
                    "Configuration changed since run {} started; resuming anyway",
                    run.id
                );
            }
            info!(
                "Resuming run {} (started {}, {})",
                run.id,
                run.started_at,
                run.status.to_db_string()
            );
            run.id
        } else {
            let id = store.create_run(&seed_url, &config_hash)?;
            info!("Starting new run {}", id);
            id
        };

        let client = build_http_client(&config.fetch)?;
        let shutdown = CancellationToken::new();
        let pool = WorkerPool::new(
            client,
            config.fetch.clone(),
            config.crawler.workers,
            shutdown.clone(),
        );

        Ok(Self {
            seed_url,
            run_id,
            state: CrawlState::Initializing,
            store,
            frontier: Frontier::new(config.crawler.max_depth),
            checkpoints: CheckpointManager::new(checkpoint_dir, run_id),
            pool,
            extractor: Arc::new(HtmlExtractor),
            classifier: Arc::new(KeywordClassifier::from_config(&config.classifier)),
            shutdown,
            batch: Vec::new(),
            in_progress: None,
            pages_done: 0,
            pages_failed: 0,
            started: Instant::now(),
            config,
        })
    }

    /// Replaces the topic classifier
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Token that stops the crawl when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn store(&self) -> &dyn PageStore {
        self.store.as_ref()
    }

    /// Runs the crawl until it reaches a terminal state
    ///
    /// On a system error the run is marked Aborted (best effort) and the
    /// error is returned. An aborted run stays resumable, so the next
    /// invocation retries from the last checkpoint.
    pub async fn run(&mut self) -> Result<CrawlReport> {
        info!(
            "Crawling {} (run {}, max depth {}, {} workers)",
            self.seed_url,
            self.run_id,
            self.config.crawler.max_depth,
            self.pool.workers()
        );

        loop {
            match self.step().await {
                Ok(CrawlState::Terminal(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    error!("Crawl run {} failed: {}", self.run_id, e);
                    if let Err(mark) =
                        self.store
                            .finish_run(self.run_id, RunStatus::Aborted, Some(&e.to_string()))
                    {
                        warn!("Could not mark run {} as aborted: {}", self.run_id, mark);
                    }
                    return Err(e);
                }
            }
        }

        let report = self.report();
        info!(
            "Crawl finished ({}): {} pages done, {} failed, depth {} in {:.1?}",
            report.terminal,
            report.pages_done,
            report.pages_failed,
            report.depth_reached,
            report.elapsed
        );
        Ok(report)
    }

    /// Performs one state transition and returns the new state
    pub async fn step(&mut self) -> Result<CrawlState> {
        let state = self.state;
        let next = match state {
            CrawlState::Initializing => self.initialize().await?,
            CrawlState::LevelActive => self.activate()?,
            CrawlState::LevelDraining => self.drain().await?,
            CrawlState::LevelAdvancing => self.advance().await?,
            CrawlState::Terminal(terminal) => return Ok(CrawlState::Terminal(terminal)),
        };

        if let CrawlState::Terminal(terminal) = next {
            self.store
                .finish_run(self.run_id, terminal.run_status(), Some(terminal.as_str()))?;
        }

        self.state = next;
        Ok(next)
    }

    /// Builds the report for the work done so far
    ///
    /// A crawl that has not reached a terminal state reports `Interrupted`.
    pub fn report(&self) -> CrawlReport {
        let terminal = match self.state {
            CrawlState::Terminal(terminal) => terminal,
            _ => TerminalState::Interrupted,
        };

        CrawlReport {
            run_id: self.run_id,
            terminal,
            depth_reached: self.frontier.depth(),
            pages_done: self.pages_done,
            pages_failed: self.pages_failed,
            elapsed: self.started.elapsed(),
        }
    }

    async fn initialize(&mut self) -> Result<CrawlState> {
        let max_depth = self.config.crawler.max_depth;

        match self.checkpoints.load().await? {
            Some(snapshot) => {
                self.frontier =
                    Frontier::restore(snapshot, max_depth, self.store.as_mut(), self.run_id)?;
            }
            None => {
                self.frontier = Frontier::new(max_depth);
                self.frontier
                    .seed(&self.seed_url, self.store.as_mut(), self.run_id)?;
                self.save_checkpoint().await?;
            }
        }

        Ok(CrawlState::LevelActive)
    }

    fn budget_remaining(&self) -> Option<u64> {
        match self.config.crawler.max_pages {
            0 => None,
            max => Some(max.saturating_sub(self.pages_done + self.pages_failed)),
        }
    }

    fn activate(&mut self) -> Result<CrawlState> {
        if self.shutdown.is_cancelled() {
            info!("Shutdown requested, stopping at depth {}", self.frontier.depth());
            return Ok(CrawlState::Terminal(TerminalState::Interrupted));
        }

        let mut size = self.config.crawler.batch_size;
        if let Some(remaining) = self.budget_remaining() {
            if remaining == 0 {
                info!("Page budget of {} reached", self.config.crawler.max_pages);
                return Ok(CrawlState::Terminal(TerminalState::Completed));
            }
            size = size.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        }

        let batch = self.frontier.next_batch(size, self.store.as_mut())?;
        if batch.is_empty() {
            return Ok(CrawlState::LevelAdvancing);
        }

        self.in_progress = Some(self.pool.dispatch(batch.clone()));
        self.batch = batch;
        Ok(CrawlState::LevelDraining)
    }

    async fn drain(&mut self) -> Result<CrawlState> {
        let batch = std::mem::take(&mut self.batch);
        let mut stream = self
            .in_progress
            .take()
            .ok_or_else(|| CrawlError::Frontier("no batch in flight".to_string()))?;
        let mut results = HashMap::with_capacity(batch.len());

        let drained = tokio::select! {
            _ = collect_results(&mut stream, &mut results) => true,
            _ = self.shutdown.cancelled() => false,
        };

        if !drained {
            let grace = Duration::from_millis(self.config.crawler.shutdown_grace_ms);
            warn!(
                "Shutdown requested, waiting up to {:?} for {} in-flight fetches",
                grace,
                batch.len() - results.len()
            );
            if tokio::time::timeout(grace, collect_results(&mut stream, &mut results))
                .await
                .is_err()
            {
                warn!("Grace period elapsed, abandoning unfinished fetches");
            }
        }
        drop(stream);

        let mut unresolved = Vec::new();
        let (mut fetched, mut failed) = (0usize, 0usize);
        for url in &batch {
            match results.remove(url) {
                Some(FetchOutcome::Fetched(page)) => {
                    self.record_page(url, page).await?;
                    fetched += 1;
                }
                Some(FetchOutcome::Failed(err)) => {
                    warn!("Failed to fetch {}: {}", url, err);
                    self.store.update_status(
                        url,
                        UrlStatus::Failed,
                        Some(&PageResult::failed(err.to_string())),
                    )?;
                    self.frontier.mark_resolved(url);
                    self.pages_failed += 1;
                    failed += 1;
                }
                Some(FetchOutcome::Cancelled) | None => unresolved.push(url.clone()),
            }
        }

        if !unresolved.is_empty() {
            info!(
                "Returning {} unresolved URLs to the frontier",
                unresolved.len()
            );
            self.frontier.requeue(&unresolved, self.store.as_mut())?;
        }

        self.save_checkpoint().await?;

        info!(
            "Depth {}: batch of {} resolved ({} fetched, {} failed), {} left in level, {} queued for depth {}",
            self.frontier.depth(),
            batch.len(),
            fetched,
            failed,
            self.frontier.current_len(),
            self.frontier.next_len(),
            self.frontier.depth() + 1
        );

        Ok(CrawlState::LevelActive)
    }

    /// Extracts, classifies and persists a fetched page
    ///
    /// Discoveries are written before the page is marked Done, so a crash in
    /// between refetches the page instead of losing its links.
    async fn record_page(&mut self, url: &str, page: FetchedPage) -> Result<()> {
        let (result, links) = if page.is_html() {
            let features = self.extractor.extract(&page.body, &page.final_url);
            let classification = self.classify(features.feature_text()).await;
            let result = PageResult {
                title: features.title,
                description: features.metadata.description,
                classification,
                error_message: None,
            };
            (result, features.links)
        } else {
            debug!(
                "Not extracting {} ({})",
                url,
                page.content_type.as_deref().unwrap_or("unknown type")
            );
            (PageResult::default(), Vec::new())
        };

        let discoveries =
            self.frontier
                .record_discoveries(url, &links, self.store.as_mut(), self.run_id)?;
        self.store
            .insert_links(url, &discoveries.links, self.run_id)?;
        self.store
            .update_status(url, UrlStatus::Done, Some(&result))?;
        self.frontier.mark_resolved(url);
        self.pages_done += 1;

        debug!(
            "Done {} ({} links, {} new, topic {})",
            url,
            discoveries.links.len(),
            discoveries.admitted.len(),
            result
                .classification
                .as_ref()
                .map(|c| c.label.as_str())
                .unwrap_or("-")
        );
        Ok(())
    }

    /// Runs the classifier on the blocking pool
    async fn classify(&self, text: String) -> Option<Classification> {
        if text.is_empty() {
            return None;
        }

        let classifier = Arc::clone(&self.classifier);
        let labels = self.config.classifier.candidate_labels.clone();
        match tokio::task::spawn_blocking(move || classifier.classify(&text, &labels)).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!("Classifier task failed: {}", e);
                None
            }
        }
    }

    async fn advance(&mut self) -> Result<CrawlState> {
        match self.frontier.advance_level()? {
            LevelAdvance::Advanced { depth, size } => {
                info!("Advancing to depth {} with {} URLs", depth, size);
                self.save_checkpoint().await?;
                Ok(CrawlState::LevelActive)
            }
            LevelAdvance::MaxDepthReached => {
                info!("Maximum depth {} reached", self.frontier.max_depth());
                Ok(CrawlState::Terminal(TerminalState::MaxDepthReached))
            }
            LevelAdvance::FrontierExhausted => {
                info!(
                    "No new URLs discovered at depth {}, frontier exhausted",
                    self.frontier.depth()
                );
                Ok(CrawlState::Terminal(TerminalState::FrontierExhausted))
            }
        }
    }

    async fn save_checkpoint(&self) -> Result<()> {
        let snapshot = self.frontier.snapshot()?;
        self.checkpoints.save(&snapshot).await?;
        Ok(())
    }
}

async fn collect_results(
    stream: &mut BoxStream<'static, FetchResult>,
    results: &mut HashMap<String, FetchOutcome>,
) {
    while let Some(result) = stream.next().await {
        results.insert(result.url, result.outcome);
    }
}
