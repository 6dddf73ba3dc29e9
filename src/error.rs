//! Error taxonomy.
//!
//! Each stage of a run has its own error type so the run controller can tell
//! a recoverable per-source failure ([`FetchError`]) apart from the fatal
//! ones. [`RunError`] is what a run ultimately fails with.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Bad or missing configuration. Always fatal, raised before any fetch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config field `{0}` must not be empty")]
    Empty(&'static str),

    #[error("config field `{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("invalid SMTP relay {host}: {source}")]
    Relay {
        host: String,
        source: lettre::transport::smtp::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Ledger storage could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ledger {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode ledger: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A single feed source could not be fetched or parsed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("not a valid RSS ({rss}) or Atom ({atom}) document")]
    Parse { rss: String, atom: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// The digest could not be handed to the mail transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("SMTP send timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a run ended in the `Failed` state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not load delivery ledger: {0}")]
    Load(#[source] PersistenceError),

    #[error("digest was not delivered: {0}")]
    Delivery(#[from] DeliveryError),

    /// The digest went out but the ledger was not updated, so the next run
    /// will send these items again.
    #[error("sent {delivered} items but failed to record them, next run will resend them: {source}")]
    CommitAfterSend {
        delivered: usize,
        source: PersistenceError,
    },
}
