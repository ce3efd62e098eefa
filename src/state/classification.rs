use serde::{Deserialize, Serialize};

/// Topic assigned to a page by a classifier
///
/// Once attached to a URL record it is never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// The winning candidate label
    pub label: String,

    /// Classifier confidence in `[0, 1]`, if the classifier reports one
    pub confidence: Option<f64>,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}
