//! The item type every feed source produces.
//!
//! `CandidateItem` is the normalised form of one RSS `<item>` or Atom
//! `<entry>`.  It only lives for the duration of a single run: it is fetched,
//! compared against the ledger, possibly mailed, and then dropped.

use chrono::{DateTime, Utc};

/// A single feed entry that may or may not have been delivered already.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CandidateItem {
    /// Stable key used for de-duplication against the ledger.
    ///
    /// RSS `<guid>` (falling back to `<link>`), or Atom `<id>`.
    pub id: String,

    /// Headline.  Untrusted, must be escaped before it goes into markup.
    pub title: String,

    /// URL of the full article.  Untrusted, same as `title`.
    pub link: Option<String>,

    /// Publication timestamp, when the feed supplied a parseable one.
    pub published: Option<DateTime<Utc>>,

    /// Description / summary as supplied by the feed, markup included.
    pub body: Option<String>,

    /// Locator of the feed this item came from.
    pub source: String,
}

