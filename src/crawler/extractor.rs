//! Page feature extraction
//!
//! This module turns a fetched HTML body into the features the crawl needs:
//! - Links to follow (from `<a href>` tags, resolved to absolute URLs)
//! - Page title
//! - Meta description and keywords
//! - Visible text
//!
//! Extraction never fails. Malformed markup yields whatever the HTML5
//! parser recovers, which may be nothing at all.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Words kept in the classifier input, matching a typical model context
const MAX_FEATURE_WORDS: usize = 512;

/// Elements whose text content is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Page metadata from `<meta>` tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub description: Option<String>,
    pub keywords: Option<String>,
}

/// Features extracted from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFeatures {
    /// Absolute http(s) links in document order
    pub links: Vec<String>,
    /// The page title (from the `<title>` tag)
    pub title: Option<String>,
    pub metadata: PageMetadata,
    /// Visible text with whitespace collapsed
    pub text: String,
}

impl PageFeatures {
    /// Builds the classifier input for this page
    ///
    /// Title, text, description and keywords are joined and lower-cased,
    /// repeated words are dropped (first occurrence kept) and non-word
    /// characters are stripped.
    pub fn feature_text(&self) -> String {
        let joined = [
            self.title.as_deref().unwrap_or(""),
            self.text.as_str(),
            self.metadata.description.as_deref().unwrap_or(""),
            self.metadata.keywords.as_deref().unwrap_or(""),
        ]
        .join(" ")
        .to_lowercase();

        let mut seen = HashSet::new();
        joined
            .split_whitespace()
            .map(strip_special_characters)
            .filter(|word| !word.is_empty() && seen.insert(word.clone()))
            .take(MAX_FEATURE_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn strip_special_characters(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Extracts features from a raw page body
pub trait FeatureExtractor: Send + Sync {
    /// Extracts best-effort features; never fails
    fn extract(&self, body: &[u8], base_url: &Url) -> PageFeatures;
}

/// [`FeatureExtractor`] backed by the `scraper` HTML5 parser
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl FeatureExtractor for HtmlExtractor {
    fn extract(&self, body: &[u8], base_url: &Url) -> PageFeatures {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        PageFeatures {
            links: extract_links(&document, base_url),
            title: extract_title(&document),
            metadata: extract_metadata(&document),
            text: extract_text(&document),
        }
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_metadata(document: &Html) -> PageMetadata {
    let mut metadata = PageMetadata::default();
    let Some(meta_selector) = selector("meta[name][content]") else {
        return metadata;
    };

    for element in document.select(&meta_selector) {
        let name = element.value().attr("name").unwrap_or("").to_ascii_lowercase();
        let content = element
            .value()
            .attr("content")
            .map(collapse_whitespace)
            .filter(|c| !c.is_empty());

        match name.as_str() {
            "description" if metadata.description.is_none() => metadata.description = content,
            "keywords" if metadata.keywords.is_none() => metadata.keywords = content,
            _ => {}
        }
    }

    metadata
}

/// Extracts all followable links from the HTML document
///
/// # Link Extraction Rules
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links and data URIs
/// - Fragment-only links (same page anchors)
/// - Anything that does not resolve to http(s)
///
/// `rel="nofollow"` links are followed.
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute URL and validates it
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}

/// Collects visible text from `<body>` (or the whole document if absent)
fn extract_text(document: &Html) -> String {
    let root = selector("body")
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|el| HIDDEN_ELEMENTS.contains(&el.value().name()));
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }

    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
