//! Statistics generation from the crawl database
//!
//! This module extracts crawl statistics from the page store and renders
//! them for the `--stats` mode and the end-of-run summary.

use crate::state::UrlStatus;
use crate::storage::{PageStore, RunRecord, StoreResult};
use std::collections::BTreeMap;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// Total number of URL records
    pub total_pages: u64,

    /// Count of records by status, in lifecycle order; zero counts omitted
    pub pages_by_status: Vec<(UrlStatus, u64)>,

    /// Number of unique domains encountered
    pub unique_domains: u64,

    /// Total number of link edges recorded
    pub total_links: u64,

    /// Record count per depth
    pub pages_by_depth: BTreeMap<u32, u64>,

    /// Classified pages per topic, most frequent first
    pub topics: Vec<(String, u64)>,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    /// Count for a single status (0 when absent)
    pub fn count(&self, status: UrlStatus) -> u64 {
        self.pages_by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    /// Share of records that were fetched and processed, in percent
    pub fn success_rate(&self) -> f64 {
        percentage(self.count(UrlStatus::Done), self.total_pages)
    }
}

/// Loads statistics from the store
///
/// # Arguments
///
/// * `store` - The page store to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StoreError)` - Failed to query statistics
pub fn load_statistics(store: &dyn PageStore) -> StoreResult<CrawlStatistics> {
    let mut pages_by_status = Vec::new();
    for status in UrlStatus::all() {
        let count = store.count_by_status(status)?;
        if count > 0 {
            pages_by_status.push((status, count));
        }
    }

    Ok(CrawlStatistics {
        total_pages: store.count_total()?,
        pages_by_status,
        unique_domains: store.count_unique_domains()?,
        total_links: store.count_links()?,
        pages_by_depth: store.depth_breakdown()?,
        topics: store.topic_breakdown()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    if let Some(run) = &stats.latest_run {
        println!("Latest run #{}:", run.id);
        println!("  Seed: {}", run.seed_url);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        match &run.outcome {
            Some(outcome) => println!("  Status: {} ({})", run.status.to_db_string(), outcome),
            None => println!("  Status: {}", run.status.to_db_string()),
        }
        println!();
    }

    println!("Overview:");
    println!("  Total pages discovered: {}", stats.total_pages);
    println!("  Unique domains: {}", stats.unique_domains);
    println!("  Total links found: {}", stats.total_links);
    println!();

    println!("Pages by Status:");
    for (status, count) in &stats.pages_by_status {
        println!(
            "  {}: {} ({:.1}%)",
            status,
            count,
            percentage(*count, stats.total_pages)
        );
    }
    println!();

    if !stats.pages_by_depth.is_empty() {
        println!("Pages by Depth:");
        for (depth, count) in &stats.pages_by_depth {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    if !stats.topics.is_empty() {
        println!("Topics:");
        for (topic, count) in &stats.topics {
            println!("  {}: {}", topic, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        stats.success_rate(),
        stats.count(UrlStatus::Done),
        stats.total_pages
    );
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64) * 100.0
    }
}
