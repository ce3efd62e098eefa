//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlStatus`: lifecycle of a single URL record (pending, in flight, done, failed)
//! - `Classification`: the topic label attached to a fetched page

mod classification;
mod url_status;

// Re-export main types
pub use classification::Classification;
pub use url_status::UrlStatus;
