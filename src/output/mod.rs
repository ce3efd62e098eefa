//! Output module for crawl statistics and reports
//!
//! This module handles:
//! - Loading crawl statistics from the page store
//! - Printing statistics for `--stats` mode
//! - Printing the end-of-run crawl report

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};

use crate::crawler::CrawlReport;

/// Prints the final report of a crawl run
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  Run: #{}", report.run_id);
    println!("  Terminal state: {}", report.terminal);
    println!("  Depth reached: {}", report.depth_reached);
    println!("  Pages done: {}", report.pages_done);
    println!("  Pages failed: {}", report.pages_failed);
    println!("  Elapsed: {:.1}s", report.elapsed.as_secs_f64());
}
