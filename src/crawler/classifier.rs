//! Topic classification
//!
//! The crawl treats classification as a black box: cleaned page text and a
//! set of candidate labels go in, at most one label comes out. Implementations
//! may be slow, so the orchestrator runs them off the async workers.

use crate::config::ClassifierConfig;
use crate::state::Classification;
use std::collections::{HashMap, HashSet};

/// Assigns a topic label to page text
pub trait Classifier: Send + Sync {
    /// Picks the best of `candidate_labels` for `text`
    ///
    /// Returns `None` when no label applies. Must be pure: the same input
    /// always yields the same output.
    fn classify(&self, text: &str, candidate_labels: &[String]) -> Option<Classification>;
}

/// Built-in vocabulary for the default candidate labels
const DEFAULT_VOCABULARY: &[(&str, &[&str])] = &[
    (
        "technology",
        &["software", "computer", "programming", "code", "internet", "digital", "app"],
    ),
    (
        "science",
        &["research", "physics", "biology", "chemistry", "study", "scientists", "space"],
    ),
    (
        "business",
        &["market", "company", "finance", "economy", "startup", "investors", "sales"],
    ),
    (
        "politics",
        &["government", "election", "policy", "minister", "senate", "parliament", "vote"],
    ),
    (
        "sports",
        &["football", "soccer", "basketball", "league", "match", "team", "tournament"],
    ),
    (
        "entertainment",
        &["movie", "music", "film", "celebrity", "television", "games", "concert"],
    ),
    (
        "health",
        &["medical", "disease", "doctor", "fitness", "hospital", "nutrition", "wellness"],
    ),
    (
        "education",
        &["school", "university", "students", "learning", "classroom", "course", "college"],
    ),
];

/// Lexical zero-shot classifier
///
/// Each label's vocabulary is the words of the label itself, the built-in
/// vocabulary for well-known labels and any keywords from the configuration.
/// A label scores one point per word of the text found in its vocabulary.
/// The highest score wins (earlier candidates win ties) and the confidence
/// is the winner's share of all points.
#[derive(Debug, Clone, Default)]
pub struct KeywordClassifier {
    vocabulary: HashMap<String, HashSet<String>>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let vocabulary = DEFAULT_VOCABULARY
            .iter()
            .map(|(label, words)| {
                (
                    label.to_string(),
                    words.iter().map(|w| w.to_string()).collect(),
                )
            })
            .collect();
        Self { vocabulary }
    }

    /// Builds a classifier with the configured extra keywords
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut classifier = Self::new();
        for (label, words) in &config.keywords {
            classifier
                .vocabulary
                .entry(label.to_lowercase())
                .or_default()
                .extend(words.iter().map(|w| w.to_lowercase()));
        }
        classifier
    }

    fn label_vocabulary(&self, label: &str) -> HashSet<String> {
        let label = label.to_lowercase();
        let mut words: HashSet<String> = tokenize(&label).map(str::to_string).collect();
        if let Some(extra) = self.vocabulary.get(&label) {
            words.extend(extra.iter().cloned());
        }
        words
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

impl Classifier for KeywordClassifier {
    fn classify(&self, text: &str, candidate_labels: &[String]) -> Option<Classification> {
        let text = text.to_lowercase();
        let words: Vec<&str> = tokenize(&text).collect();

        let mut best: Option<(&String, usize)> = None;
        let mut total = 0usize;

        for label in candidate_labels {
            let vocabulary = self.label_vocabulary(label);
            let score = words.iter().filter(|w| vocabulary.contains(**w)).count();
            total += score;

            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((label, score));
            }
        }

        best.map(|(label, score)| {
            Classification::new(label.clone(), Some(score as f64 / total as f64))
        })
    }
}
