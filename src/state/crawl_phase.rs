/// Phase definitions for a single crawl run
///
/// An orchestrator moves through these phases in order. Listing and
/// Detailing alternate once per list page until the frontier is empty.
use std::fmt;

/// Represents where a crawl run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// No run in progress
    Idle,

    /// Fetching and parsing a list page or tree node
    Listing,

    /// Fetching detail pages for the items of the current list page
    Detailing,

    /// Writing metadata after the frontier is exhausted
    Finalizing,

    /// The run finished
    Done,
}

impl CrawlPhase {
    /// Returns true if the run is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true while the run is touching the network or the store
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Listing | Self::Detailing | Self::Finalizing)
    }

    /// Returns true if moving from this phase to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Listing)
                | (Self::Listing, Self::Listing)
                | (Self::Listing, Self::Detailing)
                | (Self::Listing, Self::Finalizing)
                | (Self::Detailing, Self::Listing)
                | (Self::Detailing, Self::Finalizing)
                | (Self::Finalizing, Self::Done)
                | (Self::Done, Self::Idle)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listing => "listing",
            Self::Detailing => "detailing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
