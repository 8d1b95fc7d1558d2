/// Collection state definitions for tracking harvest progress
///
/// A collection moves forward through a fixed sequence of stages and may
/// drop out to `Skipped` from any stage that is not yet terminal.
use std::fmt;

/// Represents where a collection is in the harvest pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionState {
    // ===== Active States =====
    /// Entry page is being fetched
    Discovering,

    /// Entry page fetched, page addresses are being planned
    Paginating,

    /// Remaining pages are being fetched
    FetchingPages,

    /// Item links are being read from fetched pages
    ExtractingItems,

    /// Items are being fetched, extracted and stored
    FetchingItems,

    // ===== Terminal States =====
    /// Every reachable item was handled
    Done,

    /// Entry page could not be fetched; nothing else was attempted
    Skipped,
}

impl CollectionState {
    /// Returns true if no further processing happens for the collection
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// The stage that normally follows this one
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Discovering => Some(Self::Paginating),
            Self::Paginating => Some(Self::FetchingPages),
            Self::FetchingPages => Some(Self::ExtractingItems),
            Self::ExtractingItems => Some(Self::FetchingItems),
            Self::FetchingItems => Some(Self::Done),
            Self::Done | Self::Skipped => None,
        }
    }

    /// Returns true if moving from `self` to `to` is allowed
    pub fn can_transition_to(&self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Skipped || self.next() == Some(to)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::Paginating => "paginating",
            Self::FetchingPages => "fetching_pages",
            Self::ExtractingItems => "extracting_items",
            Self::FetchingItems => "fetching_items",
            Self::Done => "done",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
