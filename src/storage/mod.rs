//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - URL records, the deduplication authority of the crawl
//! - Link relationship tracking
//! - Run tracking and resumption support

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{PageStore, StoreError, StoreResult};

use crate::state::{Classification, UrlStatus};

/// A URL record as stored in the database
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub domain: String,
    pub depth: u32,
    pub status: UrlStatus,
    pub title: Option<String>,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub confidence: Option<f64>,
    pub discovered_from: Option<String>,
    pub discovered_run: i64,
    pub discovered_at: String,
    pub updated_at: Option<String>,
    pub error_message: Option<String>,
}

/// The fields needed to admit a new URL into the store
#[derive(Debug, Clone)]
pub struct NewUrlRecord {
    pub url: String,
    pub depth: u32,
    pub discovered_from: Option<String>,
    pub run_id: i64,
}

/// Result data written together with a status change
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub title: Option<String>,
    pub description: Option<String>,
    pub classification: Option<Classification>,
    pub error_message: Option<String>,
}

impl PageResult {
    /// Result for a failed fetch
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Represents a link relationship between pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub from_url: String,
    pub to_url: String,
    pub discovered_run: i64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub seed_url: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub outcome: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    /// Stopped by a system error; resuming retries the failed step
    Aborted,
    Failed,
}

impl RunStatus {
    /// Returns true if a later invocation may pick this run up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted | Self::Aborted)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
