//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::UrlStatus;
use crate::storage::{LinkRecord, NewUrlRecord, PageResult, RunRecord, RunStatus, UrlRecord};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
///
/// Every variant is fatal to the current run: the orchestrator must not
/// advance a level or write a checkpoint over state it failed to persist.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("URL record not found: {0}")]
    RecordNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid status transition for {url}: {from} -> {to}")]
    InvalidTransition {
        url: String,
        from: UrlStatus,
        to: UrlStatus,
    },

    #[error("Corrupt value in column {column}: {value}")]
    CorruptValue { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for page store implementations
///
/// Every write is durably committed before the call returns.
pub trait PageStore {
    // ===== Run Management =====

    /// Creates a new crawl run and returns its id
    fn create_run(&mut self, seed_url: &str, config_hash: &str) -> StoreResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StoreResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StoreResult<Option<RunRecord>>;

    /// Gets the most recent resumable run started from `seed_url`
    fn latest_resumable_run(&self, seed_url: &str) -> StoreResult<Option<RunRecord>>;

    /// Gets every resumable run, newest first
    fn resumable_runs(&self) -> StoreResult<Vec<RunRecord>>;

    /// Records the final status of a run with a finish timestamp
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        outcome: Option<&str>,
    ) -> StoreResult<()>;

    // ===== URL Records =====

    /// Returns true if a record exists for the normalized URL
    fn exists(&self, url: &str) -> StoreResult<bool>;

    /// Creates a Pending record unless one already exists
    ///
    /// The check and the insert are a single statement, so two discoveries
    /// of the same URL can never both be admitted.
    ///
    /// # Returns
    ///
    /// `true` if this call created the record, `false` if it already existed
    fn insert_if_absent(&mut self, record: &NewUrlRecord) -> StoreResult<bool>;

    /// Moves a record to a new status, attaching result data if given
    ///
    /// Rejects transitions not allowed by [`UrlStatus::can_transition_to`].
    fn update_status(
        &mut self,
        url: &str,
        status: UrlStatus,
        result: Option<&PageResult>,
    ) -> StoreResult<()>;

    /// Moves several records to the same status in one transaction
    fn update_statuses(&mut self, urls: &[String], status: UrlStatus) -> StoreResult<()>;

    /// Gets a record by its normalized URL
    fn get_record(&self, url: &str) -> StoreResult<Option<UrlRecord>>;

    /// Gets records a run discovered at a depth with one of the given
    /// statuses, in insertion order
    fn records_at_depth(
        &self,
        run_id: i64,
        depth: u32,
        statuses: &[UrlStatus],
    ) -> StoreResult<Vec<UrlRecord>>;

    /// Gets every record, in insertion order
    fn all_records(&self) -> StoreResult<Vec<UrlRecord>>;

    /// Deletes all URL records and links
    fn clear_records(&mut self) -> StoreResult<()>;

    // ===== Link Management =====

    /// Records outgoing links of a page; existing edges are ignored
    fn insert_links(&mut self, from_url: &str, to_urls: &[String], run_id: i64)
        -> StoreResult<()>;

    /// Gets all outgoing links from a page
    fn get_outgoing_links(&self, from_url: &str) -> StoreResult<Vec<LinkRecord>>;

    /// Counts the total number of links
    fn count_links(&self) -> StoreResult<u64>;

    // ===== Statistics =====

    /// Counts records by status
    fn count_by_status(&self, status: UrlStatus) -> StoreResult<u64>;

    /// Gets total record count
    fn count_total(&self) -> StoreResult<u64>;

    /// Gets count of unique domains discovered
    fn count_unique_domains(&self) -> StoreResult<u64>;

    /// Gets record count breakdown by depth
    fn depth_breakdown(&self) -> StoreResult<BTreeMap<u32, u64>>;

    /// Gets page count per topic, most common first
    fn topic_breakdown(&self) -> StoreResult<Vec<(String, u64)>>;
}
