//! Digest rendering and delivery.
//!
//! [`render_html`] turns a [`DigestBatch`] into one HTML document; a
//! [`Notifier`] ships it.  The production notifier is [`SmtpNotifier`].
//!
//! # Trust boundary
//! Title and link are escaped before they are placed into markup.  The item
//! body is inserted as-is because feeds deliver it as HTML already; it is not
//! sanitised, so the digest is only as trustworthy as the feeds it reads.

mod smtp;

pub use smtp::SmtpNotifier;

use std::fmt::Write;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::order::DigestBatch;
use crate::source::CandidateItem;

pub const DIGEST_HEADING: &str = "Your News Digest";

/// Shown instead of a date when the feed did not supply one.
pub const DATE_UNAVAILABLE: &str = "N/A";

/// Delivers a rendered digest to its single recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `batch` as one message.  No retries; any failure is returned.
    async fn send(&self, batch: &DigestBatch) -> Result<(), DeliveryError>;
}

pub fn subject(batch: &DigestBatch) -> String {
    format!("News Digest: {} New Articles", batch.len())
}

/// Render the whole digest, items in batch order.
pub fn render_html(batch: &DigestBatch) -> String {
    let mut html = format!("<h1>{DIGEST_HEADING}</h1>\n");
    for item in batch.items() {
        render_item(&mut html, item);
    }
    html
}

fn render_item(out: &mut String, item: &CandidateItem) {
    let published = item
        .published
        .map(|d| d.format("%d %b %y %H:%M UTC").to_string())
        .unwrap_or_else(|| DATE_UNAVAILABLE.to_string());

    // Writing to a String cannot fail.
    let _ = write!(
        out,
        "<hr>\n<h3><a href=\"{}\">{}</a></h3>\n<p><i>Published: {}</i></p>\n<p>{}</p>\n",
        escape_html(item.link.as_deref().unwrap_or_default()),
        escape_html(&item.title),
        published,
        item.body.as_deref().unwrap_or_default(),
    );
}

/// Escape text for use in HTML element content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
