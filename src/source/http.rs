//! HTTP feed source.
//!
//! Fetches a feed URL with a shared [`reqwest::Client`] and parses the body
//! as RSS 2.0 first, then as Atom.  Parsing is split into pure functions
//! ([`parse_rss`], [`parse_atom`], [`parse_feed`]) so tests can exercise it
//! without touching the network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;

use super::{CandidateItem, FeedSource};
use crate::error::FetchError;

const UNTITLED: &str = "(untitled)";

/// A feed reachable over HTTP(S).
pub struct HttpFeedSource {
    client: Client,
    url: String,
}

impl HttpFeedSource {
    /// `client` should already carry the request timeout; it is cheap to
    /// clone and meant to be shared by every source of a run.
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    fn locator(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError> {
        debug!(source = %self.url, "fetching feed");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await?;
        let items = parse_feed(&body, &self.url)?;

        debug!(source = %self.url, count = items.len(), "parsed feed");
        Ok(items)
    }
}

/// Parse a feed document, trying RSS and then Atom.
pub fn parse_feed(body: &[u8], source: &str) -> Result<Vec<CandidateItem>, FetchError> {
    let rss_err = match rss::Channel::read_from(body) {
        Ok(channel) => return Ok(parse_rss(&channel, source)),
        Err(e) => e,
    };
    match atom_syndication::Feed::read_from(body) {
        Ok(feed) => Ok(parse_atom(&feed, source)),
        Err(atom_err) => Err(FetchError::Parse {
            rss: rss_err.to_string(),
            atom: atom_err.to_string(),
        }),
    }
}

/// Convert an RSS channel into candidates.
///
/// Items with neither `<guid>` nor `<link>` are dropped: without a stable key
/// they would be indistinguishable from each other in the ledger.
pub fn parse_rss(channel: &rss::Channel, source: &str) -> Vec<CandidateItem> {
    channel
        .items()
        .iter()
        .filter_map(|item| {
            let id = item
                .guid()
                .map(|g| g.value().trim())
                .filter(|g| !g.is_empty())
                .or_else(|| item.link().map(str::trim).filter(|l| !l.is_empty()));
            let Some(id) = id else {
                debug!(source, title = ?item.title(), "skipping item without guid or link");
                return None;
            };

            // RFC-2822; anything unparseable degrades to "no date".
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc));

            Some(CandidateItem {
                id: id.to_string(),
                title: item.title().unwrap_or(UNTITLED).to_string(),
                link: item.link().map(String::from),
                published,
                body: item.description().or(item.content()).map(String::from),
                source: source.to_string(),
            })
        })
        .collect()
}

/// Convert an Atom feed into candidates.
pub fn parse_atom(feed: &atom_syndication::Feed, source: &str) -> Vec<CandidateItem> {
    feed.entries()
        .iter()
        .filter_map(|entry| {
            let id = entry.id().trim();
            if id.is_empty() {
                debug!(source, "skipping entry without id");
                return None;
            }

            let title = entry.title().value.trim();
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href().to_string());
            let published = entry
                .published()
                .unwrap_or_else(|| entry.updated())
                .with_timezone(&Utc);
            let body = entry
                .summary()
                .map(|s| s.value.clone())
                .or_else(|| entry.content().and_then(|c| c.value()).map(String::from));

            Some(CandidateItem {
                id: id.to_string(),
                title: if title.is_empty() { UNTITLED } else { title }.to_string(),
                link,
                published: Some(published),
                body,
                source: source.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
