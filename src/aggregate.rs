//! Feed aggregation.
//!
//! Fetches every configured source concurrently and concatenates whatever
//! came back.  A failing source is logged and skipped; it never aborts the
//! run or affects the other sources.
//!
//! Concurrency is bounded by a [`Semaphore`].  Each fetch runs on its own
//! tokio task and the join handles are awaited in configuration order, which
//! is both the barrier before selection and what keeps the concatenation
//! order stable.  No task writes to a shared collection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::source::{CandidateItem, FeedSource};

/// Default per-source fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Aggregator {
    sources: Vec<Arc<dyn FeedSource>>,
    max_concurrency: usize,
    fetch_timeout: Duration,
}

impl Aggregator {
    /// By default every source is fetched at once.
    pub fn new(sources: Vec<Arc<dyn FeedSource>>) -> Self {
        let max_concurrency = sources.len();
        Self {
            sources,
            max_concurrency,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Fetch all sources and return every successfully fetched item.
    pub async fn collect(&self) -> Vec<CandidateItem> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency.max(1)));

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let semaphore = Arc::clone(&semaphore);
                let timeout = self.fetch_timeout;
                tokio::spawn(async move {
                    // The semaphore is never closed, so acquire cannot fail.
                    let _permit = semaphore.acquire_owned().await.ok();
                    match tokio::time::timeout(timeout, source.fetch()).await {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout(timeout)),
                    }
                })
            })
            .collect();

        let mut items = Vec::new();
        let mut failed = 0usize;
        for (source, handle) in self.sources.iter().zip(handles) {
            match handle.await {
                Ok(Ok(fetched)) => {
                    debug!(source = source.locator(), count = fetched.len(), "source fetched");
                    items.extend(fetched);
                }
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(source = source.locator(), "skipping source: {e}");
                }
                Err(e) => {
                    failed += 1;
                    error!(source = source.locator(), "fetch task aborted: {e}");
                }
            }
        }

        info!(
            sources = self.sources.len(),
            failed,
            items = items.len(),
            "aggregation finished"
        );
        items
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
