//! URL handling module
//!
//! Canonicalization is what makes deduplication work: two links that point
//! at the same page must normalize to the same string before they reach the
//! page store.

mod normalize;

use url::Url;

// Re-export main functions
pub use normalize::{normalize_str, normalize_url};

/// Extracts the lowercase host from a URL
///
/// Returns None for URLs without a host (which normalized http(s) URLs
/// always have).
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
