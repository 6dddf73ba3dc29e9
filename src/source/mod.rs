//! Feed source abstraction layer.
//!
//! This module defines the [`FeedSource`] trait and the common
//! [`CandidateItem`] type.  The only production implementation is
//! [`HttpFeedSource`], which fetches a URL and parses it as RSS or Atom.
//!
//! ## For contributors
//!
//! The aggregator only ever talks to `Arc<dyn FeedSource>`, so anything that
//! can produce a list of items (a local file, an API, a test fixture) can be
//! plugged in by implementing the trait.

mod candidate;
mod http;

pub use candidate::CandidateItem;
pub use http::HttpFeedSource;

use async_trait::async_trait;

use crate::error::FetchError;

/// Trait that every feed source must implement.
///
/// Sources are fetched concurrently on tokio tasks, so implementations must
/// be [`Send`] and [`Sync`].
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// The locator this source reads from, used in log lines.
    fn locator(&self) -> &str;

    /// Fetch the current items.
    ///
    /// Errors are logged by the aggregator and the source is skipped for
    /// this run; they never abort the run.
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError>;
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------
