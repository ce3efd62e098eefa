//! Breadth-first crawl frontier
//!
//! The frontier owns the traversal structure of a crawl:
//! - `current_level`: URLs at the current depth still to be dispatched
//! - `next_level`: URLs admitted for depth + 1, in discovery order
//! - `visited`: every URL the frontier has seen
//! - `in_flight`: URLs dispatched but not yet resolved
//!
//! The page store is the deduplication authority. A URL joins `next_level`
//! only when this frontier created its record, so each URL is fetched at
//! most once and at the depth of its first discovery.

use crate::crawler::checkpoint::FrontierSnapshot;
use crate::state::UrlStatus;
use crate::storage::{NewUrlRecord, PageStore};
use crate::url::normalize_str;
use crate::{CrawlError, Result};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Result of trying to promote the next level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelAdvance {
    /// `next_level` became the current level
    Advanced { depth: u32, size: usize },
    /// The current level was the last one allowed
    MaxDepthReached,
    /// Nothing was discovered for the next level
    FrontierExhausted,
}

/// Links of one page after normalization and admission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discoveries {
    /// Every distinct normalized link of the page, in document order
    pub links: Vec<String>,
    /// Links that became new Pending records at depth + 1
    pub admitted: Vec<String>,
}

/// Breadth-first frontier over the page store
#[derive(Debug)]
pub struct Frontier {
    depth: u32,
    max_depth: u32,
    current_level: VecDeque<String>,
    next_level: Vec<String>,
    visited: HashSet<String>,
    in_flight: HashSet<String>,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            depth: 0,
            max_depth,
            current_level: VecDeque::new(),
            next_level: Vec::new(),
            visited: HashSet::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Places the seed URL at depth 0
    ///
    /// # Returns
    ///
    /// `true` if the seed was queued, `false` if the store already holds a
    /// resolved record for it
    pub fn seed(&mut self, seed: &str, store: &mut dyn PageStore, run_id: i64) -> Result<bool> {
        let url = normalize_str(seed).map_err(|source| CrawlError::InvalidSeed {
            url: seed.to_string(),
            source,
        })?;
        self.visited.insert(url.clone());

        let created = store.insert_if_absent(&NewUrlRecord {
            url: url.clone(),
            depth: 0,
            discovered_from: None,
            run_id,
        })?;

        if !created {
            let record = store
                .get_record(&url)?
                .ok_or_else(|| CrawlError::Frontier(format!("seed record vanished: {}", url)))?;

            match record.status {
                UrlStatus::Pending => {}
                UrlStatus::InFlight => store.update_status(&url, UrlStatus::Pending, None)?,
                UrlStatus::Done | UrlStatus::Failed => {
                    info!(
                        "Seed {} was already crawled ({}); use --fresh to crawl again",
                        url, record.status
                    );
                    return Ok(false);
                }
            }
        }

        self.current_level.push_back(url);
        Ok(true)
    }

    /// Takes up to `max_size` URLs from the current level and marks them InFlight
    ///
    /// URLs come out in discovery order. An empty batch means the current
    /// level has been fully dispatched.
    pub fn next_batch(&mut self, max_size: usize, store: &mut dyn PageStore) -> Result<Vec<String>> {
        let take = max_size.min(self.current_level.len());
        let batch: Vec<String> = self.current_level.drain(..take).collect();
        if batch.is_empty() {
            return Ok(batch);
        }

        store.update_statuses(&batch, UrlStatus::InFlight)?;
        self.in_flight.extend(batch.iter().cloned());

        debug!(
            "Dispatching {} URLs at depth {} ({} left in level)",
            batch.len(),
            self.depth,
            self.current_level.len()
        );
        Ok(batch)
    }

    /// Admits the outgoing links of a page fetched at the current depth
    ///
    /// Links that do not normalize are skipped. Links already seen by the
    /// frontier or present in the store are dropped, as is everything when
    /// depth + 1 exceeds `max_depth`.
    pub fn record_discoveries(
        &mut self,
        parent: &str,
        links: &[String],
        store: &mut dyn PageStore,
        run_id: i64,
    ) -> Result<Discoveries> {
        let mut discoveries = Discoveries::default();
        let mut page_links = HashSet::new();

        for link in links {
            match normalize_str(link) {
                Ok(url) => {
                    if page_links.insert(url.clone()) {
                        discoveries.links.push(url);
                    }
                }
                Err(e) => debug!("Skipping link {} on {}: {}", link, parent, e),
            }
        }

        let next_depth = self.depth + 1;
        if next_depth > self.max_depth {
            return Ok(discoveries);
        }

        for url in &discoveries.links {
            if !self.visited.insert(url.clone()) {
                continue;
            }

            let created = store.insert_if_absent(&NewUrlRecord {
                url: url.clone(),
                depth: next_depth,
                discovered_from: Some(parent.to_string()),
                run_id,
            })?;

            if created {
                self.next_level.push(url.clone());
                discoveries.admitted.push(url.clone());
            }
        }

        Ok(discoveries)
    }

    /// Marks a dispatched URL as resolved
    ///
    /// Returns false if the URL was not in flight.
    pub fn mark_resolved(&mut self, url: &str) -> bool {
        self.in_flight.remove(url)
    }

    /// Returns unresolved in-flight URLs to the front of the current level
    ///
    /// Their records go back to Pending so a later run fetches them again.
    pub fn requeue(&mut self, urls: &[String], store: &mut dyn PageStore) -> Result<()> {
        let urls: Vec<String> = urls
            .iter()
            .filter(|url| self.in_flight.contains(url.as_str()))
            .cloned()
            .collect();
        if urls.is_empty() {
            return Ok(());
        }

        store.update_statuses(&urls, UrlStatus::Pending)?;
        for url in urls.into_iter().rev() {
            self.in_flight.remove(&url);
            self.current_level.push_front(url);
        }
        Ok(())
    }

    /// Returns true when nothing is left to dispatch or resolve at this depth
    pub fn is_level_drained(&self) -> bool {
        self.current_level.is_empty() && self.in_flight.is_empty()
    }

    /// Promotes the next level once the current one is drained
    ///
    /// # Errors
    ///
    /// Fails if the current level still has queued or in-flight URLs.
    pub fn advance_level(&mut self) -> Result<LevelAdvance> {
        if !self.is_level_drained() {
            return Err(CrawlError::Frontier(format!(
                "cannot advance from depth {}: {} queued, {} in flight",
                self.depth,
                self.current_level.len(),
                self.in_flight.len()
            )));
        }

        if self.depth >= self.max_depth {
            return Ok(LevelAdvance::MaxDepthReached);
        }
        if self.next_level.is_empty() {
            return Ok(LevelAdvance::FrontierExhausted);
        }

        self.current_level = std::mem::take(&mut self.next_level).into();
        self.depth += 1;

        Ok(LevelAdvance::Advanced {
            depth: self.depth,
            size: self.current_level.len(),
        })
    }

    /// Captures the frontier for a checkpoint
    ///
    /// # Errors
    ///
    /// Fails while any URL is in flight.
    pub fn snapshot(&self) -> Result<FrontierSnapshot> {
        if !self.in_flight.is_empty() {
            return Err(CrawlError::Frontier(format!(
                "cannot snapshot with {} URLs in flight",
                self.in_flight.len()
            )));
        }

        Ok(FrontierSnapshot {
            depth: self.depth,
            current_level: self.current_level.iter().cloned().collect(),
            next_level: self.next_level.clone(),
            visited: self.visited.iter().cloned().collect(),
        })
    }

    /// Rebuilds a frontier from a checkpoint, reconciled with the store
    ///
    /// - URLs already Done or Failed in the store are dropped
    /// - URLs left InFlight by a crash are reset to Pending
    /// - Pending records of `run_id` at the checkpoint depth or the next one
    ///   that the checkpoint does not list are appended in discovery order
    pub fn restore(
        snapshot: FrontierSnapshot,
        max_depth: u32,
        store: &mut dyn PageStore,
        run_id: i64,
    ) -> Result<Self> {
        let mut frontier = Self {
            depth: snapshot.depth,
            max_depth,
            current_level: VecDeque::new(),
            next_level: Vec::new(),
            visited: snapshot.visited.into_iter().collect(),
            in_flight: HashSet::new(),
        };

        let current = reconcile_level(snapshot.current_level, snapshot.depth, store, run_id)?;
        let next = reconcile_level(snapshot.next_level, snapshot.depth + 1, store, run_id)?;
        for url in current.iter().chain(&next) {
            frontier.visited.insert(url.clone());
        }
        frontier.current_level = current.into();
        frontier.next_level = next;

        info!(
            "Restored frontier at depth {}: {} current, {} next, {} visited",
            frontier.depth,
            frontier.current_level.len(),
            frontier.next_level.len(),
            frontier.visited.len()
        );
        Ok(frontier)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn current_len(&self) -> usize {
        self.current_level.len()
    }

    pub fn next_len(&self) -> usize {
        self.next_level.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }
}

/// Keeps the unresolved URLs of a checkpointed level and adds the ones it missed
fn reconcile_level(
    listed: Vec<String>,
    depth: u32,
    store: &mut dyn PageStore,
    run_id: i64,
) -> Result<Vec<String>> {
    let mut level = Vec::with_capacity(listed.len());
    let mut stale = Vec::new();

    for url in listed {
        match store.get_record(&url)? {
            Some(record) if record.status.is_resolved() => {}
            Some(record) => {
                if record.status == UrlStatus::InFlight {
                    stale.push(url.clone());
                }
                level.push(url);
            }
            None => {
                return Err(CrawlError::Frontier(format!(
                    "checkpoint lists {} but the store has no record of it",
                    url
                )))
            }
        }
    }

    let listed: HashSet<String> = level.iter().cloned().collect();
    let unlisted =
        store.records_at_depth(run_id, depth, &[UrlStatus::Pending, UrlStatus::InFlight])?;
    for record in unlisted {
        if listed.contains(&record.url) {
            continue;
        }
        if record.status == UrlStatus::InFlight {
            stale.push(record.url.clone());
        }
        debug!("Recovered unlisted record {} at depth {}", record.url, depth);
        level.push(record.url);
    }

    if !stale.is_empty() {
        warn!(
            "Resetting {} URLs left in flight at depth {} to pending",
            stale.len(),
            depth
        );
        store.update_statuses(&stale, UrlStatus::Pending)?;
    }

    Ok(level)
}
