//! Pagination cursor and page types exchanged with storage backends.

use super::object::ObjectSummary;

/// Where the next page of a listing begins.
///
/// A listing starts at [`ContinuationToken::Start`], follows whatever
/// [`ContinuationToken::Next`] cursors the backend hands out, and stops at
/// [`ContinuationToken::Done`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ContinuationToken {
    #[default]
    Start,
    Next(String),
    Done,
}

impl ContinuationToken {
    /// Map a backend's "next marker" to a token. Absent or empty markers end
    /// the listing.
    pub fn from_marker(marker: Option<String>) -> Self {
        match marker {
            Some(m) if !m.is_empty() => ContinuationToken::Next(m),
            _ => ContinuationToken::Done,
        }
    }

    pub fn has_more(&self) -> bool {
        !matches!(self, ContinuationToken::Done)
    }

    /// The opaque cursor to send with the next request, if any.
    pub fn marker(&self) -> Option<&str> {
        match self {
            ContinuationToken::Next(m) => Some(m),
            _ => None,
        }
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ObjectSummary>,
    pub next: ContinuationToken,
}

impl ListPage {
    pub fn new(items: Vec<ObjectSummary>, next: ContinuationToken) -> Self {
        Self { items, next }
    }

    /// An empty terminal page.
    pub fn done() -> Self {
        Self {
            items: Vec::new(),
            next: ContinuationToken::Done,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next.has_more()
    }
}
