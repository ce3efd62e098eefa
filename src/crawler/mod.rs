//! Crawler module for breadth-first crawling
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with timeouts and bounded retry
//! - A bounded worker pool for concurrent fetches
//! - The level-by-level frontier and its checkpoints
//! - Feature extraction and topic classification
//! - Overall crawl orchestration

mod checkpoint;
mod classifier;
mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod pool;

pub use checkpoint::{CheckpointError, CheckpointManager, FrontierSnapshot, CHECKPOINT_VERSION};
pub use classifier::{Classifier, KeywordClassifier};
pub use coordinator::{CrawlReport, CrawlState, Orchestrator, TerminalState};
pub use extractor::{FeatureExtractor, HtmlExtractor, PageFeatures, PageMetadata};
pub use fetcher::{build_http_client, fetch_url, FetchError, FetchOutcome, FetchedPage};
pub use frontier::{Discoveries, Frontier, LevelAdvance};
pub use pool::{dispatch_with, FetchResult, WorkerPool};
