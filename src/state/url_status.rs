/// URL status definitions for tracking crawl progress
///
/// This module defines the lifecycle of a URL record in the page store.
use std::fmt;

/// Represents the current status of a URL in the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    // ===== Active States =====
    /// URL has been admitted to the frontier but not yet dispatched
    Pending,

    /// URL is part of the batch currently being fetched
    InFlight,

    // ===== Terminal States =====
    /// Page was fetched and processed (possibly with empty features)
    Done,

    /// Fetch failed (timeout, transport error, HTTP error status)
    Failed,
}

impl UrlStatus {
    /// Returns true if this is a terminal status (no further processing needed)
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is permitted
    ///
    /// `InFlight -> Pending` only happens when an unfinished fetch is abandoned
    /// during shutdown or reconciled while restoring a checkpoint.
    pub fn can_transition_to(&self, next: UrlStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InFlight)
                | (Self::InFlight, Self::Done)
                | (Self::InFlight, Self::Failed)
                | (Self::InFlight, Self::Pending)
        )
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::InFlight, Self::Done, Self::Failed]
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
