//! feed-digest: mail a digest of feed items that have not been sent before.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────┐ items ┌───────────┐ delta ┌──────────┐ batch ┌────────────┐
//! │ aggregate  │ ────► │  select   │ ────► │  order   │ ────► │   notify   │
//! │ (sources)  │       │ (ledger)  │       │ (shuffle)│       │   (SMTP)   │
//! └────────────┘       └───────────┘       └──────────┘       └────────────┘
//!        ▲                   ▲                                       │ ok
//!        └──────────── run (controller) ◄──── ledger.persist() ◄─────┘
//! ```
//!
//! * **`source/`**: the `FeedSource` trait, `CandidateItem`, and the HTTP
//!   RSS/Atom implementation.
//! * **`aggregate`**: fetches all sources concurrently, skipping failures.
//! * **`ledger`**: the persisted set of already-delivered identifiers.
//! * **`select`**: keeps items the ledger has not seen.
//! * **`order`**: shuffles them into a `DigestBatch`.
//! * **`notify/`**: renders the batch as HTML and mails it.
//! * **`run`**: sequences one invocation and owns the commit protocol.
//! * **`config`**: JSON config file and SMTP credentials.
//! * **`main`**: logging, wiring, and the process exit code.
//!
//! The binary takes no arguments.  It exits 0 when a digest was sent or there
//! was nothing new, and non-zero on any fatal error.

mod aggregate;
mod config;
mod error;
mod ledger;
mod notify;
mod order;
mod run;
mod select;
mod source;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aggregate::Aggregator;
use config::{Config, Credentials, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use error::ConfigError;
use notify::SmtpNotifier;
use run::{RunOutcome, Runner};
use source::{FeedSource, HttpFeedSource};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    init_tracing();
    if dotenv.is_err() {
        info!("no .env file found, relying on process environment");
    }

    match run().await {
        Ok(RunOutcome::NothingNew) => ExitCode::SUCCESS,
        Ok(RunOutcome::Delivered(count)) => {
            info!(count, "run complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<RunOutcome> {
    // -- configuration -------------------------------------------------------
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let credentials = Credentials::from_env().context("missing SMTP credentials")?;

    // -- collaborators -------------------------------------------------------
    let notifier =
        SmtpNotifier::new(&config, credentials).context("failed to set up SMTP transport")?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.fetch_timeout())
        .connect_timeout(config.fetch_timeout())
        .build()
        .map_err(ConfigError::HttpClient)?;

    let sources: Vec<Arc<dyn FeedSource>> = config
        .feed_urls
        .iter()
        .map(|url| Arc::new(HttpFeedSource::new(client.clone(), url)) as Arc<dyn FeedSource>)
        .collect();

    let aggregator = Aggregator::new(sources)
        .with_max_concurrency(config.max_concurrency())
        .with_fetch_timeout(config.fetch_timeout());

    // -- run -----------------------------------------------------------------
    info!(sources = config.feed_urls.len(), "checking for new articles");
    let mut runner = Runner::new(
        aggregator,
        Box::new(notifier),
        config.ledger_path.clone(),
        StdRng::from_entropy(),
    );
    let result = runner.run().await;
    debug!(state = %runner.state(), "run finished");
    Ok(result?)
}
